//! Request and response documents exchanged with the invoking process.
//!
//! Requests arrive as JSON on standard input; responses are written as JSON
//! to standard output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Source;

/// A version as exchanged with the invoking process.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VersionRef {
    /// The version string.
    pub version: String,
}

impl VersionRef {
    /// Wrap `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// A name/value pair reported alongside a version.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MetadataField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
}

impl MetadataField {
    /// A field named `name` holding `value`.
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Input of the `check` command.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CheckRequest {
    /// Repository configuration.
    pub source: Source,
    /// The newest version already known, if any.
    #[serde(default)]
    pub version: Option<VersionRef>,
}

/// Input of the `in` command.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct InRequest {
    /// Repository configuration.
    pub source: Source,
    /// The version to fetch.
    pub version: VersionRef,
    /// Fetch parameters.
    #[serde(default)]
    pub params: InParams,
}

/// Parameters of the `in` command.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InParams {
    /// Record the manifest without downloading files.
    pub skip_download: bool,
    /// File-name globs further restricting the download.
    pub include_files: Vec<String>,
}

/// Output of the `in` command.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct InResponse {
    /// The fetched version.
    pub version: VersionRef,
    /// `files` and `bytes` counts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataField>,
}

/// Input of the `out` command.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct OutRequest {
    /// Repository configuration.
    pub source: Source,
    /// Publish parameters.
    #[serde(default)]
    pub params: OutParams,
}

/// Parameters of the `out` command.
///
/// Either `files` with `version`, or `metalink`, must be given. Paths are
/// relative to the working directory argument.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutParams {
    /// Glob naming one existing manifest to publish.
    pub metalink: Option<String>,
    /// Globs naming local files to publish.
    pub files: Vec<String>,
    /// Path of a file holding the version of `files`.
    pub version: Option<String>,
    /// Manifest name template.
    pub rename: Option<String>,
    /// Path of a file holding the manifest name template.
    pub rename_from_file: Option<String>,
    /// Repository options overriding `source.options` for this publish.
    pub options: Map<String, Value>,
}

/// Output of the `out` command.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OutResponse {
    /// The published version.
    pub version: VersionRef,
    /// Additional details.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataField>,
}
