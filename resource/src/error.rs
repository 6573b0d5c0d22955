//! Error types for the metalink repository resource.
//!
//! Each variant maps to one failure category reported to the operator. Errors
//! are propagated unchanged or wrapped with the file or destination they
//! concern; nothing is swallowed.

use metalink_common::{HashAlgorithm, ManifestError, ManifestParseError, ManifestWriteError};
use thiserror::Error;

/// Errors that can occur while selecting, fetching or publishing manifests.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The request document or a handler configuration is invalid.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// Description of the problem.
        reason: String,
    },

    /// A filter names an unknown predicate kind.
    #[error("unsupported filter kind: {kind}")]
    InvalidPredicateKind {
        /// The rejected kind.
        kind: String,
    },

    /// A filter expression cannot be parsed for its kind.
    #[error("invalid {kind} filter expression {expression:?}: {reason}")]
    InvalidPredicateExpression {
        /// The filter kind.
        kind: String,
        /// The rejected expression.
        expression: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A repository source was queried before it was loaded.
    #[error("repository source has not been loaded")]
    NotLoaded,

    /// The local working copy cannot be fast-forwarded or pushed.
    #[error("repository out of sync: {reason}")]
    SyncConflict {
        /// Output of the rejected operation.
        reason: String,
    },

    /// A git operation failed.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git operation that failed (clone, log, etc.).
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A manifest in the repository could not be parsed.
    #[error("failed to parse manifest {path}")]
    ManifestParse {
        /// Repository-relative path of the manifest.
        path: String,
        /// The underlying parse failure.
        #[source]
        source: ManifestParseError,
    },

    /// A manifest could not be serialized.
    #[error(transparent)]
    ManifestWrite(#[from] ManifestWriteError),

    /// A manifest does not describe a usable release.
    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] ManifestError),

    /// Nothing matched a selection that requires a match.
    #[error("no match found: {what}")]
    NotFound {
        /// What was being looked for.
        what: String,
    },

    /// More than one candidate matched where exactly one was required.
    #[error("{count} matches found for {what} where one is expected")]
    AmbiguousMatch {
        /// What was being looked for.
        what: String,
        /// Number of matches.
        count: usize,
    },

    /// No registered handler accepts the location.
    #[error("no handler for location {url}")]
    NoHandlerForScheme {
        /// The unresolved location.
        url: String,
    },

    /// A handler could not read or write a location.
    #[error("transport failed for {url}: {reason}")]
    Transport {
        /// The location being accessed.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// A file declares no digest this crate can verify.
    #[error("file {file} declares no supported digest")]
    NoUsableDigest {
        /// The file name.
        file: String,
    },

    /// A computed digest differs from the declared one.
    #[error("{algorithm} digest mismatch for {file}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The file name.
        file: String,
        /// The algorithm used.
        algorithm: HashAlgorithm,
        /// Declared digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },

    /// A file signature did not verify against the trust store.
    #[error("signature verification failed for {file}: {reason}")]
    SignatureInvalid {
        /// The file name.
        file: String,
        /// Why verification failed.
        reason: String,
    },

    /// Every upload attempt to a mirror failed.
    #[error("mirror upload to {destination} failed: {cause}")]
    MirrorUploadFailed {
        /// Rendered destination location.
        destination: String,
        /// The error from the final attempt.
        #[source]
        cause: Box<ResourceError>,
    },

    /// A file transfer failed.
    #[error("transfer of {file} failed: {cause}")]
    FileTransfer {
        /// The file name.
        file: String,
        /// The underlying failure.
        #[source]
        cause: Box<ResourceError>,
    },

    /// A destination or name template could not be rendered.
    #[error("template {template:?} could not be rendered: {reason}")]
    Template {
        /// The template text.
        template: String,
        /// Why rendering failed.
        reason: String,
    },

    /// The request document could not be decoded.
    #[error("invalid request: {0}")]
    Request(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl ResourceError {
    /// Operator-facing failure category.
    ///
    /// Wrapping variants report the category of the failure they wrap.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. }
            | Self::InvalidPredicateKind { .. }
            | Self::InvalidPredicateExpression { .. }
            | Self::Template { .. }
            | Self::Request(_) => "configuration",
            Self::SyncConflict { .. } => "sync conflict",
            Self::NotLoaded
            | Self::Git { .. }
            | Self::ManifestParse { .. }
            | Self::ManifestWrite(_)
            | Self::InvalidManifest(_) => "repository",
            Self::NotFound { .. } => "not found",
            Self::AmbiguousMatch { .. } => "ambiguous match",
            Self::NoHandlerForScheme { .. } | Self::Transport { .. } | Self::Io(_) => "transport",
            Self::NoUsableDigest { .. }
            | Self::DigestMismatch { .. }
            | Self::SignatureInvalid { .. } => "integrity",
            Self::MirrorUploadFailed { .. } => "mirror upload",
            Self::FileTransfer { cause, .. } => cause.category(),
            #[cfg(any(test, feature = "test-support"))]
            Self::StubMismatch { .. } => "test stub",
        }
    }

    /// Build a [`ResourceError::Configuration`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Build a [`ResourceError::Transport`] from any displayable failure.
    pub fn transport(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using [`ResourceError`].
pub type Result<T> = std::result::Result<T, ResourceError>;
