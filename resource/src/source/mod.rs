//! Repository sources: enumerate manifests and store new ones.
//!
//! A source starts unloaded. [`Source::load`] materializes the backing store
//! and parses every manifest, after which [`Source::filter`] may be called
//! any number of times. Enumeration order is the backing store's glob order,
//! not version order; callers sort explicitly.

mod file;
mod git;

pub use file::FileSource;
pub use git::{GitSource, GitUri};

use std::path::PathBuf;

use metalink_common::parse_manifest;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::entry::{EntryReference, RepositoryEntry};
use crate::error::{ResourceError, Result};
use crate::filter::Filter;
use crate::git::SystemCommandExecutor;

/// File suffix of manifests in a repository.
pub const MANIFEST_SUFFIX: &str = ".meta4";

/// A backing store of manifests.
pub trait Source {
    /// The repository URI as configured.
    fn uri(&self) -> &str;

    /// Materialize or refresh the backing store and parse every manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::SyncConflict`] when the local copy cannot be
    /// fast-forwarded and [`ResourceError::ManifestParse`] naming the path of
    /// a malformed manifest.
    fn load(&mut self) -> Result<()>;

    /// Entries matching `filter`, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NotLoaded`] before [`Source::load`] and the
    /// first predicate failure otherwise.
    fn filter(&self, filter: &dyn Filter) -> Result<Vec<RepositoryEntry>>;

    /// Store a manifest named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the manifest cannot be written or published.
    fn put(&mut self, name: &str, contents: &[u8]) -> Result<()>;
}

/// Options accepted by repository sources.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SourceOptions {
    /// Branch to track; the remote's default branch when absent.
    pub branch: Option<String>,
    /// Commit author name used when storing manifests.
    pub author_name: Option<String>,
    /// Commit author email used when storing manifests.
    pub author_email: Option<String>,
    /// Directory holding git working copies; the system temp dir when absent.
    pub cache_dir: Option<PathBuf>,
}

impl SourceOptions {
    /// Decode options from a request's option map.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] for unknown keys or wrongly
    /// typed values.
    pub fn from_map(options: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(options.clone()))
            .map_err(|err| ResourceError::configuration(format!("source options: {err}")))
    }
}

/// Create a source for `uri`.
///
/// `git+<transport-url>[//<path>][#<branch>]` selects a git-backed source;
/// `file://<dir>` or a bare path selects a directory source.
///
/// # Errors
///
/// Returns [`ResourceError::Configuration`] for unsupported URIs or invalid
/// options.
///
/// # Examples
///
/// ```
/// use metalink_resource::source::create_source;
///
/// let source = create_source("file:///srv/releases", &serde_json::Map::new())
///     .expect("valid source");
/// assert_eq!(source.uri(), "file:///srv/releases");
/// assert!(create_source("svn://example.com/repo", &serde_json::Map::new()).is_err());
/// ```
pub fn create_source(uri: &str, options: &Map<String, Value>) -> Result<Box<dyn Source>> {
    let parsed = SourceOptions::from_map(options)?;
    if uri.starts_with("git+") {
        let source = GitSource::new(uri, &parsed, SystemCommandExecutor::default())?;
        return Ok(Box::new(source));
    }
    if let Some(dir) = uri.strip_prefix("file://") {
        return Ok(Box::new(FileSource::new(uri, dir)));
    }
    if !uri.is_empty() && !uri.contains("://") {
        return Ok(Box::new(FileSource::new(uri, uri)));
    }
    Err(ResourceError::configuration(format!(
        "unsupported repository uri: {uri}"
    )))
}

/// Evaluate `filter` over loaded entries in order.
///
/// # Errors
///
/// Returns [`ResourceError::NotLoaded`] when `entries` is `None` and the
/// first predicate failure otherwise.
pub fn filter_in_memory(
    entries: Option<&[RepositoryEntry]>,
    filter: &dyn Filter,
) -> Result<Vec<RepositoryEntry>> {
    let loaded = entries.ok_or(ResourceError::NotLoaded)?;
    let mut matched = Vec::new();
    for entry in loaded {
        if filter.is_true(entry)? {
            matched.push(entry.clone());
        }
    }
    Ok(matched)
}

/// Parse manifest bytes into an entry.
pub(crate) fn parse_entry(
    repository: &str,
    path: String,
    revision: String,
    bytes: &[u8],
) -> Result<RepositoryEntry> {
    let manifest = parse_manifest(bytes).map_err(|source| ResourceError::ManifestParse {
        path: path.clone(),
        source,
    })?;
    Ok(RepositoryEntry {
        reference: EntryReference {
            repository: repository.to_owned(),
            path,
            revision,
        },
        manifest,
    })
}

/// Reject manifest names that would escape the manifest directory.
pub(crate) fn validate_manifest_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(ResourceError::configuration(format!(
            "invalid manifest name: {name:?}"
        )));
    }
    Ok(())
}
