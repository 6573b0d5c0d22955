//! Shared metalink primitives used by the repository resource.
//!
//! # Modules
//!
//! - [`hash`] - Digest algorithms, strength ordering and streaming digests
//! - [`manifest`] - Manifest, file, hash and location model
//! - [`manifest_parser`] - XML and JSON manifest codec
//! - [`version`] - Semantic-version precedence with opaque fallbacks
//! - `testing` - Fixture helpers (behind the `test-support` feature)

pub mod hash;
pub mod manifest;
pub mod manifest_parser;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod version;

pub use hash::{HashAlgorithm, digest_all, digests_match};
pub use manifest::{Hash, Location, Manifest, ManifestError, ManifestFile, Signature};
pub use manifest_parser::{ManifestParseError, ManifestWriteError, parse_manifest, write_manifest};
pub use version::{VersionKey, compare_versions};
