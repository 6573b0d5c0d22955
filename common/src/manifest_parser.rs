//! Manifest encoding and decoding.
//!
//! Manifests are read from either RFC 5854 metalink XML or the equivalent
//! JSON document and are always written back as XML. A document whose first
//! non-whitespace character is `{` is treated as JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::{Hash, Location, Manifest, ManifestFile, Signature};

/// XML namespace of metalink 4 documents.
pub const METALINK_NAMESPACE: &str = "urn:ietf:params:xml:ns:metalink";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Errors arising from manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    /// JSON deserialization failed.
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML deserialization failed.
    #[error("manifest parse error: {0}")]
    Xml(String),

    /// The `published` element is not an RFC 3339 timestamp.
    #[error("manifest parse error: invalid published timestamp {value}")]
    InvalidTimestamp {
        /// The rejected value.
        value: String,
    },

    /// The document is not valid UTF-8.
    #[error("manifest parse error: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Errors arising from manifest serialization.
#[derive(Debug, thiserror::Error)]
#[error("manifest write error: {message}")]
pub struct ManifestWriteError {
    message: String,
}

/// Parse manifest bytes, detecting JSON or XML from the content.
///
/// # Errors
///
/// Returns [`ManifestParseError`] when the document is malformed.
///
/// # Examples
///
/// ```
/// use metalink_common::manifest_parser::parse_manifest;
///
/// let json = br#"{"files":[{"name":"test","version":"1.0.0"}]}"#;
/// let manifest = parse_manifest(json).expect("valid manifest");
/// assert_eq!(manifest.version(), Some("1.0.0"));
/// ```
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, ManifestParseError> {
    let text = std::str::from_utf8(bytes)?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('{') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    parse_xml(trimmed)
}

/// Serialize a manifest as an indented metalink XML document.
///
/// # Errors
///
/// Returns [`ManifestWriteError`] when serialization fails.
pub fn write_manifest(manifest: &Manifest) -> Result<Vec<u8>, ManifestWriteError> {
    let document = XmlMetalink::from(manifest);
    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    document.serialize(serializer).map_err(|err| ManifestWriteError {
        message: err.to_string(),
    })?;
    let mut output = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
    output.push_str(XML_DECLARATION);
    output.push_str(&body);
    output.push('\n');
    Ok(output.into_bytes())
}

fn parse_xml(text: &str) -> Result<Manifest, ManifestParseError> {
    let document: XmlMetalink =
        quick_xml::de::from_str(text).map_err(|err| ManifestParseError::Xml(err.to_string()))?;
    let published = document
        .published
        .as_deref()
        .map(parse_timestamp)
        .transpose()?;
    Ok(Manifest {
        files: document.files.into_iter().map(ManifestFile::from).collect(),
        published,
        generator: document.generator,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ManifestParseError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ManifestParseError::InvalidTimestamp {
            value: value.to_owned(),
        })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "metalink")]
struct XmlMetalink {
    #[serde(rename = "@xmlns", default)]
    xmlns: String,
    #[serde(rename = "file", default)]
    files: Vec<XmlFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlFile {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "hash", default)]
    hashes: Vec<XmlHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<XmlSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(rename = "url", default)]
    urls: Vec<XmlUrl>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlHash {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlUrl {
    #[serde(rename = "@location", default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(rename = "@priority", default, skip_serializing_if = "Option::is_none")]
    priority: Option<u32>,
    #[serde(rename = "$text")]
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlSignature {
    #[serde(rename = "@mediatype")]
    media_type: String,
    #[serde(rename = "$text")]
    value: String,
}

impl From<&Manifest> for XmlMetalink {
    fn from(manifest: &Manifest) -> Self {
        Self {
            xmlns: METALINK_NAMESPACE.to_owned(),
            files: manifest.files.iter().map(XmlFile::from).collect(),
            generator: manifest.generator.clone(),
            published: manifest
                .published
                .map(|published| published.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<&ManifestFile> for XmlFile {
    fn from(file: &ManifestFile) -> Self {
        Self {
            name: file.name.clone(),
            hashes: file
                .hashes
                .iter()
                .map(|hash| XmlHash {
                    kind: hash.kind.clone(),
                    value: hash.digest.clone(),
                })
                .collect(),
            signature: file.signature.as_ref().map(|signature| XmlSignature {
                media_type: signature.media_type.clone(),
                value: signature.value.clone(),
            }),
            size: Some(file.size),
            urls: file
                .locations
                .iter()
                .map(|location| XmlUrl {
                    location: location.label.clone(),
                    priority: location.priority,
                    url: location.url.clone(),
                })
                .collect(),
            version: file.version.clone(),
        }
    }
}

impl From<XmlFile> for ManifestFile {
    fn from(file: XmlFile) -> Self {
        Self {
            name: file.name,
            version: file.version.trim().to_owned(),
            size: file.size.unwrap_or_default(),
            hashes: file
                .hashes
                .into_iter()
                .map(|hash| Hash {
                    kind: hash.kind,
                    digest: hash.value.trim().to_owned(),
                })
                .collect(),
            locations: file
                .urls
                .into_iter()
                .map(|url| Location {
                    url: url.url.trim().to_owned(),
                    priority: url.priority,
                    label: url.location,
                })
                .collect(),
            signature: file.signature.map(|signature| Signature {
                media_type: signature.media_type,
                value: signature.value.trim().to_owned(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "manifest_parser_tests.rs"]
mod tests;
