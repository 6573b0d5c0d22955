//! Digest algorithms recognised in manifest hash entries.
//!
//! Algorithms are ordered by strength so verification can pick the strongest
//! declared digest with a plain `max`. Digests are streamed in fixed-size
//! chunks and rendered as lowercase hexadecimal.

use std::fmt;
use std::io::{self, Read};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

const CHUNK_SIZE: usize = 8192;

/// Digest algorithms supported for verification, ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    /// MD5 (128-bit).
    Md5,
    /// SHA-1 (160-bit).
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm, strongest first.
    pub const STRONGEST_FIRST: [Self; 4] = [Self::Sha512, Self::Sha256, Self::Sha1, Self::Md5];

    /// Canonical metalink hash type name.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_common::hash::HashAlgorithm;
    ///
    /// assert_eq!(HashAlgorithm::Sha256.name(), "sha-256");
    /// ```
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha-1",
            Self::Sha256 => "sha-256",
            Self::Sha512 => "sha-512",
        }
    }

    /// Placeholder key used by destination templates, e.g. `{{.SHA1}}`.
    #[must_use]
    pub const fn template_key(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Resolve a hash type name, ignoring case and the optional hyphen.
    ///
    /// Returns `None` for algorithms that cannot be verified.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_common::hash::HashAlgorithm;
    ///
    /// assert_eq!(HashAlgorithm::from_name("SHA512"), Some(HashAlgorithm::Sha512));
    /// assert_eq!(HashAlgorithm::from_name("crc32"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Stream `reader` to completion and return the lowercase hex digest.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while reading.
    pub fn digest_reader<R: Read>(self, reader: R) -> io::Result<String> {
        match self {
            Self::Md5 => stream_digest::<Md5, R>(reader),
            Self::Sha1 => stream_digest::<Sha1, R>(reader),
            Self::Sha256 => stream_digest::<Sha256, R>(reader),
            Self::Sha512 => stream_digest::<Sha512, R>(reader),
        }
    }

    /// Digest an in-memory buffer.
    #[must_use]
    pub fn digest_bytes(self, bytes: &[u8]) -> String {
        match self {
            Self::Md5 => format!("{:x}", Md5::digest(bytes)),
            Self::Sha1 => format!("{:x}", Sha1::digest(bytes)),
            Self::Sha256 => format!("{:x}", Sha256::digest(bytes)),
            Self::Sha512 => format!("{:x}", Sha512::digest(bytes)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compare two hex digests case-insensitively.
#[must_use]
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// Compute every supported digest in a single pass, strongest first.
///
/// # Errors
///
/// Returns any I/O error raised while reading.
pub fn digest_all<R: Read>(mut reader: R) -> io::Result<Vec<(HashAlgorithm, String)>> {
    let mut sha512 = Sha512::new();
    let mut sha256 = Sha256::new();
    let mut sha1 = Sha1::new();
    let mut md5 = Md5::new();
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
            break;
        };
        sha512.update(chunk);
        sha256.update(chunk);
        sha1.update(chunk);
        md5.update(chunk);
    }
    Ok(vec![
        (HashAlgorithm::Sha512, format!("{:x}", sha512.finalize())),
        (HashAlgorithm::Sha256, format!("{:x}", sha256.finalize())),
        (HashAlgorithm::Sha1, format!("{:x}", sha1.finalize())),
        (HashAlgorithm::Md5, format!("{:x}", md5.finalize())),
    ])
}

fn stream_digest<D: Digest, R: Read>(mut reader: R) -> io::Result<String>
where
    sha2::digest::Output<D>: fmt::LowerHex,
{
    let mut hasher = D::new();
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
            break;
        };
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
