//! Ed25519 signature verification against a PEM trust store.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};
use metalink_common::Signature;

use crate::error::{ResourceError, Result};

/// Media type of signatures this crate verifies.
pub const ED25519_MEDIA_TYPE: &str = "application/ed25519-signature";

const PEM_END: &str = "-----END PUBLIC KEY-----";

/// Public keys trusted to sign released files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustStore {
    keys: Vec<VerifyingKey>,
}

impl TrustStore {
    /// Parse every `PUBLIC KEY` block in `pem`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] when a block is not an
    /// Ed25519 public key or the text holds no keys at all.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let mut keys = Vec::new();
        for block in pem.split_inclusive(PEM_END) {
            if !block.contains(PEM_END) {
                continue;
            }
            let key = VerifyingKey::from_public_key_pem(block.trim()).map_err(|err| {
                ResourceError::configuration(format!("signature_trust_store: {err}"))
            })?;
            keys.push(key);
        }
        if keys.is_empty() {
            return Err(ResourceError::configuration(
                "signature_trust_store holds no public keys",
            ));
        }
        Ok(Self { keys })
    }

    /// Number of trusted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check that `signature` over `content` was made by a trusted key.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::SignatureInvalid`] for a missing,
    /// unsupported or malformed signature, or one no trusted key accepts.
    pub fn verify(&self, file: &str, signature: Option<&Signature>, content: &[u8]) -> Result<()> {
        let invalid = |reason: &str| ResourceError::SignatureInvalid {
            file: file.to_owned(),
            reason: reason.to_owned(),
        };
        let signature = signature.ok_or_else(|| invalid("file is not signed"))?;
        if !signature.media_type.eq_ignore_ascii_case(ED25519_MEDIA_TYPE) {
            return Err(invalid(&format!(
                "unsupported signature type {}",
                signature.media_type
            )));
        }
        let raw = STANDARD
            .decode(signature.value.trim())
            .map_err(|err| invalid(&format!("signature is not base64: {err}")))?;
        let parsed = Ed25519Signature::from_slice(&raw)
            .map_err(|err| invalid(&format!("malformed signature: {err}")))?;

        if self
            .keys
            .iter()
            .any(|key| key.verify_strict(content, &parsed).is_ok())
        {
            return Ok(());
        }
        Err(invalid("no trusted key accepts the signature"))
    }
}
