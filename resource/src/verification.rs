//! Integrity checks applied to downloaded files.
//!
//! The policy is fixed before any transfer starts. Digest verification uses
//! the strongest algorithm the manifest declares; signature verification is
//! an independent check over the same bytes. Results are collected in a
//! [`VerificationReporter`] and emitted only once every transfer is done.

use std::io::{self, Read, Write};
use std::sync::{Mutex, PoisonError};

use metalink_common::{HashAlgorithm, ManifestFile, digests_match};

use crate::config::Source;
use crate::error::{ResourceError, Result};
use crate::handler::FileReference;
use crate::signature::TrustStore;

/// What to verify after each download.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Bypass digest selection and comparison.
    pub skip_hash: bool,
    /// Bypass signature verification.
    pub skip_signature: bool,
    /// Keys trusted for signature verification; signatures are not checked
    /// when absent.
    pub trust_store: Option<TrustStore>,
}

impl VerificationPolicy {
    /// The policy a source requests.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] when the trust store does not
    /// parse.
    pub fn from_source(source: &Source) -> Result<Self> {
        let trust_store = match source.signature_trust_store.as_deref() {
            Some(pem) if !source.skip_signature_verification && !pem.trim().is_empty() => {
                Some(TrustStore::from_pem(pem)?)
            }
            _ => None,
        };
        Ok(Self {
            skip_hash: source.skip_hash_verification,
            skip_signature: source.skip_signature_verification,
            trust_store,
        })
    }

    /// Verify the bytes at `local` against `file`'s declarations.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NoUsableDigest`],
    /// [`ResourceError::DigestMismatch`] or
    /// [`ResourceError::SignatureInvalid`].
    pub fn verify(
        &self,
        file: &ManifestFile,
        local: &dyn FileReference,
        reporter: &VerificationReporter,
    ) -> Result<()> {
        if self.skip_hash {
            reporter.record(format!("{}: digest verification skipped", file.name));
        } else {
            let (algorithm, digest) = verify_digest(file, local)?;
            reporter.record(format!("{}: {algorithm} digest OK ({digest})", file.name));
        }

        if self.skip_signature {
            return Ok(());
        }
        if let Some(store) = &self.trust_store {
            let mut content = Vec::new();
            local
                .reader()?
                .read_to_end(&mut content)
                .map_err(|err| ResourceError::transport(local.reader_uri(), err))?;
            store.verify(&file.name, file.signature.as_ref(), &content)?;
            reporter.record(format!("{}: signature OK", file.name));
        }
        Ok(())
    }
}

/// Compute the strongest declared digest of `local` and compare it.
///
/// Returns the algorithm used and the matching digest.
///
/// # Errors
///
/// Returns [`ResourceError::NoUsableDigest`] when `file` declares no known
/// algorithm and [`ResourceError::DigestMismatch`] on any difference.
pub fn verify_digest(
    file: &ManifestFile,
    local: &dyn FileReference,
) -> Result<(HashAlgorithm, String)> {
    let (algorithm, expected) =
        file.strongest_hash()
            .ok_or_else(|| ResourceError::NoUsableDigest {
                file: file.name.clone(),
            })?;
    let actual = algorithm
        .digest_reader(local.reader()?)
        .map_err(|err| ResourceError::transport(local.reader_uri(), err))?;
    if !digests_match(expected, &actual) {
        return Err(ResourceError::DigestMismatch {
            file: file.name.clone(),
            algorithm,
            expected: expected.to_owned(),
            actual,
        });
    }
    log::debug!("{}: {algorithm} digest matches", file.name);
    Ok((algorithm, actual))
}

/// Append-only sink for verification result lines, shared by workers.
#[derive(Debug, Default)]
pub struct VerificationReporter {
    lines: Mutex<Vec<String>>,
}

impl VerificationReporter {
    /// An empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result line.
    pub fn record(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Lines recorded so far, in recording order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write every recorded line to `out`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while writing.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in self.lines() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}
