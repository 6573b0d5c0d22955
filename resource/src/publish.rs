//! The `out` command: build or load a manifest, mirror its files and store it.
//!
//! A manifest is either generated from local files or read from an existing
//! manifest file. When mirrors are configured each file is uploaded to every
//! destination and the resulting locations are appended before the manifest
//! is serialized again. Otherwise the original bytes are stored unchanged.
//! Publishing is not transactional: uploads that succeeded before a failure
//! are left in place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use metalink_common::{Manifest, ManifestFile, digest_all, parse_manifest, write_manifest};

use crate::config::MirrorFileConfig;
use crate::error::{ResourceError, Result};
use crate::handler::{FileReference, LocalFile};
use crate::mirror::{RetryPolicy, TemplateValues, mirror_file, render_template};
use crate::progress::ByteCounter;
use crate::request::{OutParams, OutRequest, OutResponse, VersionRef};
use crate::resolver::LocationResolver;
use crate::source::{Source, create_source};

/// Manifest name used when no rename is requested.
pub const DEFAULT_MANIFEST_NAME: &str = "v{{.Version}}.meta4";

/// Generator recorded on manifests built from local files.
pub const GENERATOR: &str = concat!("metalink-resource/", env!("CARGO_PKG_VERSION"));

/// A manifest ready to be mirrored and stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedManifest {
    /// The parsed manifest.
    pub manifest: Manifest,
    /// Serialized form stored when no mirroring modifies the manifest.
    pub raw: Vec<u8>,
    /// Local paths of files the manifest was built from, by file name.
    pub local_files: BTreeMap<String, PathBuf>,
}

impl PreparedManifest {
    /// The release version, taken from the first file.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidManifest`] when the manifest lists no
    /// files or its first file has no version.
    pub fn version(&self) -> Result<&str> {
        Ok(self.manifest.validate()?)
    }
}

/// Publish according to `request`, resolving `working_dir`-relative paths.
///
/// # Errors
///
/// Returns configuration, template, transport or repository errors; see
/// [`publish_to`].
pub fn publish(request: &OutRequest, working_dir: &Path) -> Result<OutResponse> {
    let options = request.source.merged_options(&request.params.options);
    let mut source = create_source(&request.source.uri, &options)?;
    publish_to(request, working_dir, source.as_mut(), &RetryPolicy::default())
}

/// Publish according to `request` into an already constructed `source`.
///
/// # Errors
///
/// Returns [`ResourceError::Configuration`] for missing parameters,
/// [`ResourceError::NotFound`] or [`ResourceError::AmbiguousMatch`] for the
/// manifest glob, [`ResourceError::InvalidManifest`] for a manifest without
/// a version, [`ResourceError::MirrorUploadFailed`] once uploads give up and
/// the source's error when storing fails.
pub fn publish_to(
    request: &OutRequest,
    working_dir: &Path,
    source: &mut dyn Source,
    retry: &RetryPolicy,
) -> Result<OutResponse> {
    let mut config = request.source.clone();
    config.migrate_legacy_mirror_env();
    let resolver = LocationResolver::from_configs(&config.handler_configs()?);

    let mut prepared = prepare_manifest(&request.params, working_dir)?;
    let version = prepared.version()?.to_owned();

    let contents = if config.mirror_files.is_empty() {
        prepared.raw
    } else {
        mirror_manifest(
            &mut prepared.manifest,
            &prepared.local_files,
            &config.mirror_files,
            &resolver,
            retry,
        )?;
        write_manifest(&prepared.manifest)?
    };

    let name = manifest_name(&request.params, working_dir, &version)?;
    source.put(&name, &contents)?;
    log::info!("published {name} ({version}) to {}", source.uri());
    Ok(OutResponse {
        version: VersionRef::new(version),
        metadata: Vec::new(),
    })
}

/// Build a manifest from `params.files` or load the one `params.metalink`
/// names.
///
/// # Errors
///
/// Returns [`ResourceError::Configuration`] when neither is given.
pub fn prepare_manifest(params: &OutParams, working_dir: &Path) -> Result<PreparedManifest> {
    if !params.files.is_empty() {
        let version_file = params.version.as_deref().ok_or_else(|| {
            ResourceError::configuration("params.version is required with params.files")
        })?;
        let version = fs::read_to_string(working_dir.join(version_file))?;
        return build_from_files(&params.files, version.trim(), working_dir);
    }
    match params.metalink.as_deref() {
        Some(pattern) => load_existing(pattern, working_dir),
        None => Err(ResourceError::configuration(
            "one of params.files or params.metalink is required",
        )),
    }
}

/// Describe the files matching `patterns` in a new manifest at `version`.
///
/// # Errors
///
/// Returns [`ResourceError::Configuration`] for an invalid glob and any I/O
/// error raised while hashing.
pub fn build_from_files(
    patterns: &[String],
    version: &str,
    working_dir: &Path,
) -> Result<PreparedManifest> {
    let mut manifest = Manifest {
        files: Vec::new(),
        published: Some(Utc::now()),
        generator: Some(GENERATOR.to_owned()),
    };
    let mut local_files = BTreeMap::new();
    for pattern in patterns {
        for path in glob_paths(pattern, working_dir)? {
            let file = describe_file(&path, version)?;
            log::debug!("described {} ({} bytes)", file.name, file.size);
            local_files.insert(file.name.clone(), path);
            manifest.files.push(file);
        }
    }
    let raw = write_manifest(&manifest)?;
    Ok(PreparedManifest {
        manifest,
        raw,
        local_files,
    })
}

fn describe_file(path: &Path, version: &str) -> Result<ManifestFile> {
    let local = LocalFile::new(path);
    let mut file = ManifestFile::new(local.name(), version);
    file.size = local.size()?;
    for (algorithm, digest) in digest_all(local.reader()?)? {
        file.set_hash(algorithm, digest);
    }
    Ok(file)
}

/// Load the single manifest matching `pattern`, keeping its raw bytes.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] or [`ResourceError::AmbiguousMatch`]
/// unless exactly one path matches, and a parse error for a malformed file.
pub fn load_existing(pattern: &str, working_dir: &Path) -> Result<PreparedManifest> {
    let mut paths = glob_paths(pattern, working_dir)?;
    let path = match (paths.pop(), paths.len()) {
        (Some(path), 0) => path,
        (None, _) => {
            return Err(ResourceError::NotFound {
                what: format!("metalink {pattern}"),
            });
        }
        (Some(_), others) => {
            return Err(ResourceError::AmbiguousMatch {
                what: format!("metalink {pattern}"),
                count: others + 1,
            });
        }
    };
    let raw = fs::read(&path)?;
    let manifest = parse_manifest(&raw).map_err(|source| ResourceError::ManifestParse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(PreparedManifest {
        manifest,
        raw,
        local_files: BTreeMap::new(),
    })
}

fn glob_paths(pattern: &str, working_dir: &Path) -> Result<Vec<PathBuf>> {
    let full = working_dir.join(pattern);
    let paths = glob::glob(&full.to_string_lossy())
        .map_err(|err| ResourceError::configuration(format!("pattern {pattern:?}: {err}")))?;
    paths
        .map(|path| path.map_err(|err| ResourceError::Io(err.into_error())))
        .collect()
}

/// Upload every file of `manifest` to each mirror, appending the new
/// locations.
///
/// Files built from local paths are read from there; other files are read
/// from their first declared location.
///
/// # Errors
///
/// Returns [`ResourceError::InvalidManifest`] before any upload when a file
/// name is not a plain file name, [`ResourceError::Configuration`] for a file
/// with nothing to read from, and any error from [`mirror_file`].
pub fn mirror_manifest(
    manifest: &mut Manifest,
    local_files: &BTreeMap<String, PathBuf>,
    mirrors: &[MirrorFileConfig],
    resolver: &LocationResolver,
    retry: &RetryPolicy,
) -> Result<()> {
    for file in &manifest.files {
        file.local_name()?;
    }
    let counter = ByteCounter::new();
    for file in &mut manifest.files {
        let local: Box<dyn FileReference> = match local_files.get(&file.name) {
            Some(path) => Box::new(LocalFile::new(path)),
            None => {
                let first = file.locations.first().ok_or_else(|| {
                    ResourceError::configuration(format!(
                        "file {} has no location to mirror from",
                        file.name
                    ))
                })?;
                resolver.resolve(&first.url)?
            }
        };
        mirror_file(file, local.as_ref(), mirrors, resolver, retry, &counter)?;
    }
    log::info!("mirrored {} bytes", counter.total());
    Ok(())
}

/// The name to store the manifest under.
///
/// `rename` wins over `rename_from_file`; both are templates rendered with
/// the manifest version.
///
/// # Errors
///
/// Returns an I/O error for an unreadable rename file and
/// [`ResourceError::Template`] for an unrenderable name.
pub fn manifest_name(params: &OutParams, working_dir: &Path, version: &str) -> Result<String> {
    let template = match (params.rename.as_deref(), params.rename_from_file.as_deref()) {
        (Some(rename), _) if !rename.is_empty() => rename.to_owned(),
        (_, Some(path)) if !path.is_empty() => {
            fs::read_to_string(working_dir.join(path))?.trim().to_owned()
        }
        _ => DEFAULT_MANIFEST_NAME.to_owned(),
    };
    render_template(&template, &TemplateValues::for_version(version))
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
