//! Manifest model: one released version described as a set of files.
//!
//! A manifest lists files, each with a version, a byte size, digests and
//! candidate download locations. The JSON shape mirrors the XML element
//! names:
//!
//! ```json
//! {
//!   "files": [{
//!     "name": "a-first.txt",
//!     "version": "0.1.0",
//!     "size": 12,
//!     "hashes": [{"type": "sha-512", "hash": "b972..."}],
//!     "urls": [{"url": "https://example.com/a-first.txt", "priority": 1}]
//!   }]
//! }
//! ```

use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::HashAlgorithm;

/// Errors raised when a manifest cannot be used as a release description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// The manifest lists no files.
    #[error("manifest has no file entries")]
    MissingFiles,

    /// The first file entry carries no version.
    #[error("manifest file {name} has no version")]
    MissingVersion {
        /// Name of the offending file entry.
        name: String,
    },

    /// A file name is not a single plain path component.
    #[error("manifest file name {name:?} is not a plain file name")]
    UnsafeFileName {
        /// The rejected name.
        name: String,
    },
}

/// One released version of an artefact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// File entries in document order.
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    /// When the manifest was generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    /// Identifier of the tool that generated the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Manifest {
    /// The first non-empty file version, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_common::manifest::{Manifest, ManifestFile};
    ///
    /// let manifest = Manifest {
    ///     files: vec![ManifestFile::new("a.txt", "1.0.0")],
    ///     ..Manifest::default()
    /// };
    /// assert_eq!(manifest.version(), Some("1.0.0"));
    /// ```
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.files
            .iter()
            .map(|file| file.version.as_str())
            .find(|version| !version.is_empty())
    }

    /// Check the manifest describes a publishable release.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingFiles`] when no files are listed and
    /// [`ManifestError::MissingVersion`] when the first file has no version.
    pub fn validate(&self) -> Result<&str, ManifestError> {
        let first = self.files.first().ok_or(ManifestError::MissingFiles)?;
        if first.version.is_empty() {
            return Err(ManifestError::MissingVersion {
                name: first.name.clone(),
            });
        }
        Ok(&first.version)
    }

    /// Look up a file entry by name.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&ManifestFile> {
        self.files.iter().find(|file| file.name == name)
    }
}

/// A single named file within a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Base name of the file.
    pub name: String,
    /// Release version of the file.
    #[serde(default)]
    pub version: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Declared digests in insertion order.
    #[serde(default)]
    pub hashes: Vec<Hash>,
    /// Candidate download locations.
    #[serde(default, rename = "urls")]
    pub locations: Vec<Location>,
    /// Detached signature over the file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl ManifestFile {
    /// Create an entry with a name and version and no other metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// The file name, checked to be one plain path component.
    ///
    /// Names are joined onto download and mirror directories, so absolute
    /// paths, separators, `.` and `..` are refused.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnsafeFileName`] for any other name.
    pub fn local_name(&self) -> Result<&str, ManifestError> {
        let mut components = Path::new(&self.name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !self.name.contains(['/', '\\']) => {
                Ok(&self.name)
            }
            _ => Err(ManifestError::UnsafeFileName {
                name: self.name.clone(),
            }),
        }
    }

    /// The declared digest for `algorithm`, matching type names leniently.
    #[must_use]
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes
            .iter()
            .find(|hash| hash.algorithm() == Some(algorithm))
            .map(|hash| hash.digest.as_str())
    }

    /// The strongest declared digest this crate can verify.
    #[must_use]
    pub fn strongest_hash(&self) -> Option<(HashAlgorithm, &str)> {
        self.hashes
            .iter()
            .filter_map(|hash| hash.algorithm().map(|algorithm| (algorithm, hash.digest.as_str())))
            .max_by_key(|(algorithm, _)| *algorithm)
    }

    /// Record a digest, replacing any existing entry for the same algorithm.
    pub fn set_hash(&mut self, algorithm: HashAlgorithm, digest: impl Into<String>) {
        let value = digest.into();
        if let Some(existing) = self
            .hashes
            .iter_mut()
            .find(|hash| hash.algorithm() == Some(algorithm))
        {
            existing.digest = value;
            return;
        }
        self.hashes.push(Hash {
            kind: algorithm.name().to_owned(),
            digest: value,
        });
    }
}

/// A declared digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hash {
    /// Hash type name as written in the document, e.g. `sha-256`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Hex-encoded digest.
    #[serde(rename = "hash")]
    pub digest: String,
}

impl Hash {
    /// The recognised algorithm for this entry.
    #[must_use]
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::from_name(&self.kind)
    }
}

/// A candidate download location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Location URL.
    pub url: String,
    /// Advisory client-side priority; lower is preferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Free-form label such as a country code.
    #[serde(default, rename = "location", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Location {
    /// A location with no priority or label.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority: None,
            label: None,
        }
    }
}

/// A detached signature attached to a file entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Media type describing the signature scheme.
    #[serde(rename = "mediatype")]
    pub media_type: String,
    /// Encoded signature body.
    pub value: String,
}
