//! Source configuration decoded from request documents.
//!
//! The `source` object is shared by every command. Handler configurations
//! arrive as untyped `{type, include, exclude, options}` records and are
//! validated once into [`HandlerConfig`] values, so option mistakes surface
//! as [`ResourceError::Configuration`] before any transfer starts.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ResourceError, Result};

/// Default number of concurrent download workers.
pub const DEFAULT_PARALLEL: usize = 2;

const fn default_parallel() -> usize {
    DEFAULT_PARALLEL
}

/// The `source` section of a request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Source {
    /// Repository location, e.g. `git+https://host/repo.git//path`.
    pub uri: String,
    /// Repository options such as the branch or commit author.
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Bypass digest verification of downloaded files.
    #[serde(default)]
    pub skip_hash_verification: bool,
    /// Bypass signature verification of downloaded files.
    #[serde(default)]
    pub skip_signature_verification: bool,
    /// PEM-encoded public keys trusted for signature verification.
    #[serde(default)]
    pub signature_trust_store: Option<String>,
    /// Operator-configured transport handlers, highest precedence first.
    #[serde(default)]
    pub url_handlers: Vec<RawHandlerConfig>,
    /// Upload destinations used when publishing.
    #[serde(default)]
    pub mirror_files: Vec<MirrorFileConfig>,
    /// File-name globs a downloaded file must match.
    #[serde(default)]
    pub include_files: Vec<String>,
    /// File-name globs excluding files from download.
    #[serde(default)]
    pub exclude_files: Vec<String>,
    /// Version constraint applied to every selection.
    #[serde(default)]
    pub version: Option<String>,
    /// Additional `{kind: expression}` filters.
    #[serde(default)]
    pub filters: Vec<BTreeMap<String, String>>,
    /// Concurrent download workers.
    #[serde(default = "default_parallel")]
    pub parallel: usize,
}

impl Source {
    /// A source for `uri` with every other setting defaulted.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: Map::new(),
            skip_hash_verification: false,
            skip_signature_verification: false,
            signature_trust_store: None,
            url_handlers: Vec::new(),
            mirror_files: Vec::new(),
            include_files: Vec::new(),
            exclude_files: Vec::new(),
            version: None,
            filters: Vec::new(),
            parallel: DEFAULT_PARALLEL,
        }
    }

    /// The `(kind, expression)` filter pairs this source requests.
    ///
    /// The `version` constraint, when set, comes first.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] when a filter map does not
    /// hold exactly one entry.
    pub fn filter_specs(&self) -> Result<Vec<(String, String)>> {
        let mut specs = Vec::with_capacity(self.filters.len() + 1);
        if let Some(version) = self.version.as_deref().filter(|v| !v.trim().is_empty()) {
            specs.push(("fileversion".to_owned(), version.to_owned()));
        }
        for (index, filter) in self.filters.iter().enumerate() {
            let mut entries = filter.iter();
            match (entries.next(), entries.next()) {
                (Some((kind, expression)), None) => {
                    specs.push((kind.clone(), expression.clone()));
                }
                _ => {
                    return Err(ResourceError::configuration(format!(
                        "filter {index}: must have a single key/value tuple"
                    )));
                }
            }
        }
        Ok(specs)
    }

    /// Validate every handler configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError::Configuration`] encountered.
    pub fn handler_configs(&self) -> Result<Vec<HandlerConfig>> {
        self.url_handlers
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                HandlerConfig::try_from(raw).map_err(|err| match err {
                    ResourceError::Configuration { reason } => {
                        ResourceError::configuration(format!("url_handlers[{index}]: {reason}"))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Convert legacy `mirror_files[].env` credentials into handler entries.
    ///
    /// Earlier requests carried object-storage credentials as environment
    /// variables on each mirror. Each mirror with an `env` map gains an
    /// appended `s3` handler holding the equivalent explicit options. No
    /// process environment is read or written.
    pub fn migrate_legacy_mirror_env(&mut self) {
        for mirror in &self.mirror_files {
            if mirror.env.is_empty() {
                continue;
            }
            let mut options = Map::new();
            for (key, value) in &mirror.env {
                let option = match key.as_str() {
                    "AWS_ACCESS_KEY_ID" => "access_key",
                    "AWS_SECRET_ACCESS_KEY" => "secret_key",
                    _ => continue,
                };
                options.insert(option.to_owned(), Value::String(value.clone()));
            }
            log::debug!("migrating legacy mirror env for {}", mirror.destination);
            self.url_handlers.push(RawHandlerConfig {
                kind: "s3".to_owned(),
                include: Vec::new(),
                exclude: Vec::new(),
                options: Value::Object(options),
            });
        }
    }

    /// Repository options with `overrides` merged on top.
    #[must_use]
    pub fn merged_options(&self, overrides: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.options.clone();
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// An upload destination for published files.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct MirrorFileConfig {
    /// Destination template, e.g. `s3://bucket/{{.SHA1}}`.
    pub destination: String,
    /// Label recorded on the resulting location.
    #[serde(default)]
    pub location: Option<String>,
    /// Priority recorded on the resulting location.
    #[serde(default)]
    pub priority: Option<u32>,
    /// Legacy credential variables; see [`Source::migrate_legacy_mirror_env`].
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A handler configuration as written in the request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RawHandlerConfig {
    /// Handler type: `s3`, `ftp`, `http` or `file`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Regular expressions a location must match (any) to use the handler.
    #[serde(default)]
    pub include: Vec<String>,
    /// Regular expressions excluding locations from the handler.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Handler-specific options.
    #[serde(default)]
    pub options: Value,
}

/// A validated handler configuration.
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Typed options for the handler kind.
    pub kind: HandlerKind,
    /// Compiled include patterns.
    pub include: Vec<Regex>,
    /// Compiled exclude patterns.
    pub exclude: Vec<Regex>,
}

/// Typed handler options, one variant per supported handler type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// Object storage.
    S3(S3Options),
    /// FTP.
    Ftp(FtpOptions),
    /// HTTP and HTTPS.
    Http(HttpOptions),
    /// Local files.
    File,
}

/// Options for the `s3` handler.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct S3Options {
    /// Access key id; requests are unsigned when absent.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// Bucket region.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Role assumed through STS before any request; the configured keys, or
    /// the ambient AWS credential chain, sign the `AssumeRole` call.
    pub role_arn: Option<String>,
    /// Session name for the assumed role.
    pub role_session_name: Option<String>,
}

/// Options for the `ftp` handler.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FtpOptions {
    /// Login user; anonymous when absent.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
}

/// Options for the `http` handler.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpOptions {
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

impl TryFrom<&RawHandlerConfig> for HandlerConfig {
    type Error = ResourceError;

    fn try_from(raw: &RawHandlerConfig) -> Result<Self> {
        let kind = match raw.kind.as_str() {
            "s3" => HandlerKind::S3(decode_options(&raw.kind, &raw.options)?),
            "ftp" => HandlerKind::Ftp(decode_options(&raw.kind, &raw.options)?),
            "http" => HandlerKind::Http(decode_options(&raw.kind, &raw.options)?),
            "file" => {
                decode_options::<NoOptions>(&raw.kind, &raw.options)?;
                HandlerKind::File
            }
            other => {
                return Err(ResourceError::configuration(format!(
                    "unsupported handler: {other}"
                )));
            }
        };
        Ok(Self {
            kind,
            include: compile_patterns("include", &raw.include)?,
            exclude: compile_patterns("exclude", &raw.exclude)?,
        })
    }
}

fn decode_options<T: DeserializeOwned>(kind: &str, options: &Value) -> Result<T> {
    let value = if options.is_null() {
        Value::Object(Map::new())
    } else {
        options.clone()
    };
    serde_json::from_value(value)
        .map_err(|err| ResourceError::configuration(format!("{kind} options: {err}")))
}

fn compile_patterns(field: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| {
                ResourceError::configuration(format!("{field} pattern {pattern:?}: {err}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn source_from(value: Value) -> Source {
        serde_json::from_value(value).expect("valid source")
    }

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let source = source_from(json!({"uri": "file:///tmp/repo"}));
        assert_eq!(source, Source::new("file:///tmp/repo"));
        assert_eq!(source.parallel, DEFAULT_PARALLEL);
    }

    #[test]
    fn filter_specs_put_version_first() {
        let source = source_from(json!({
            "uri": "file:///tmp/repo",
            "version": "^1.0.0",
            "filters": [{"repositorypath": "*.meta4"}]
        }));
        let specs = source.filter_specs().expect("valid filters");
        assert_eq!(
            specs,
            vec![
                ("fileversion".to_owned(), "^1.0.0".to_owned()),
                ("repositorypath".to_owned(), "*.meta4".to_owned()),
            ]
        );
    }

    #[rstest]
    #[case::empty(json!([{}]))]
    #[case::two_entries(json!([{"axiom": "", "filename": "*.tgz"}]))]
    fn filter_specs_reject_multi_entry_maps(#[case] filters: Value) {
        let source = source_from(json!({"uri": "file:///tmp/repo", "filters": filters}));
        let err = source.filter_specs().expect_err("invalid filter map");
        assert!(err.to_string().contains("filter 0"));
    }

    #[test]
    fn s3_handler_options_are_typed() {
        let raw = RawHandlerConfig {
            kind: "s3".to_owned(),
            include: vec!["^s3://private/".to_owned()],
            exclude: Vec::new(),
            options: json!({"access_key": "AKIA", "secret_key": "shh"}),
        };
        let config = HandlerConfig::try_from(&raw).expect("valid handler");
        assert_eq!(
            config.kind,
            HandlerKind::S3(S3Options {
                access_key: Some("AKIA".to_owned()),
                secret_key: Some("shh".to_owned()),
                ..S3Options::default()
            })
        );
        assert_eq!(config.include.len(), 1);
    }

    #[test]
    fn s3_role_options_are_decoded() {
        let raw = RawHandlerConfig {
            kind: "s3".to_owned(),
            include: Vec::new(),
            exclude: Vec::new(),
            options: json!({
                "role_arn": "arn:aws:iam::123456789012:role/releases",
                "role_session_name": "ci-fetch",
                "region": "eu-west-1",
            }),
        };
        let config = HandlerConfig::try_from(&raw).expect("role options are known");
        assert_eq!(
            config.kind,
            HandlerKind::S3(S3Options {
                role_arn: Some("arn:aws:iam::123456789012:role/releases".to_owned()),
                role_session_name: Some("ci-fetch".to_owned()),
                region: Some("eu-west-1".to_owned()),
                ..S3Options::default()
            })
        );
    }

    #[rstest]
    #[case::unknown_type("gopher", json!(null), "unsupported handler")]
    #[case::wrong_value_type("s3", json!({"access_key": 42}), "s3 options")]
    #[case::unknown_option("ftp", json!({"role_arn": "x"}), "ftp options")]
    #[case::file_takes_no_options("file", json!({"root": "/"}), "file options")]
    fn invalid_handlers_fail_as_configuration(
        #[case] kind: &str,
        #[case] options: Value,
        #[case] expected: &str,
    ) {
        let raw = RawHandlerConfig {
            kind: kind.to_owned(),
            include: Vec::new(),
            exclude: Vec::new(),
            options,
        };
        let err = HandlerConfig::try_from(&raw).expect_err("invalid handler");
        assert_eq!(err.category(), "configuration");
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[test]
    fn invalid_include_pattern_is_reported_with_index() {
        let source = source_from(json!({
            "uri": "file:///tmp/repo",
            "url_handlers": [{"type": "http", "include": ["("]}]
        }));
        let err = source.handler_configs().expect_err("invalid regex");
        assert!(err.to_string().contains("url_handlers[0]"));
    }

    #[test]
    fn legacy_mirror_env_becomes_s3_handler() {
        let mut source = source_from(json!({
            "uri": "file:///tmp/repo",
            "mirror_files": [{
                "destination": "s3://bucket/{{.Name}}",
                "env": {"AWS_ACCESS_KEY_ID": "id", "AWS_SECRET_ACCESS_KEY": "secret"}
            }]
        }));
        source.migrate_legacy_mirror_env();

        let configs = source.handler_configs().expect("valid handlers");
        let kinds: Vec<_> = configs.into_iter().map(|config| config.kind).collect();
        assert_eq!(
            kinds,
            vec![HandlerKind::S3(S3Options {
                access_key: Some("id".to_owned()),
                secret_key: Some("secret".to_owned()),
                ..S3Options::default()
            })]
        );
    }

    #[test]
    fn merged_options_prefer_overrides() {
        let source = source_from(json!({
            "uri": "file:///tmp/repo",
            "options": {"branch": "main", "author_name": "ci"}
        }));
        let overrides = json!({"branch": "release"});
        let merged = source.merged_options(overrides.as_object().expect("object"));
        assert_eq!(merged.get("branch"), Some(&json!("release")));
        assert_eq!(merged.get("author_name"), Some(&json!("ci")));
    }
}
