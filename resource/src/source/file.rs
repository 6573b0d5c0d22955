//! Directory-backed repository source.

use std::fs;
use std::path::{Path, PathBuf};

use metalink_common::HashAlgorithm;

use super::{MANIFEST_SUFFIX, Source, filter_in_memory, parse_entry, validate_manifest_name};
use crate::entry::RepositoryEntry;
use crate::error::{ResourceError, Result};
use crate::filter::Filter;

/// Manifests stored as `*.meta4` files in a local directory.
///
/// The revision token of each manifest is the SHA-1 of its bytes, so it is
/// stable for unchanged content and changes whenever the content does.
#[derive(Debug)]
pub struct FileSource {
    uri: String,
    dir: PathBuf,
    entries: Option<Vec<RepositoryEntry>>,
}

impl FileSource {
    /// A source over `dir`, reported as `uri`.
    pub fn new(uri: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            uri: uri.into(),
            dir: dir.as_ref().to_path_buf(),
            entries: None,
        }
    }

    fn manifest_paths(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.dir.join(format!("*{MANIFEST_SUFFIX}"));
        let pattern_text = pattern.to_string_lossy();
        let paths = glob::glob(&pattern_text).map_err(|err| {
            ResourceError::configuration(format!("repository path {}: {err}", self.dir.display()))
        })?;
        paths
            .map(|path| path.map_err(|err| ResourceError::Io(err.into_error())))
            .collect()
    }
}

impl Source for FileSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn load(&mut self) -> Result<()> {
        let mut entries = Vec::new();
        for path in self.manifest_paths()? {
            let bytes = fs::read(&path)?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let revision = HashAlgorithm::Sha1.digest_bytes(&bytes);
            entries.push(parse_entry(&self.uri, name, revision, &bytes)?);
        }
        log::debug!("loaded {} manifests from {}", entries.len(), self.uri);
        self.entries = Some(entries);
        Ok(())
    }

    fn filter(&self, filter: &dyn Filter) -> Result<Vec<RepositoryEntry>> {
        filter_in_memory(self.entries.as_deref(), filter)
    }

    fn put(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        validate_manifest_name(name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(name), contents)?;
        log::info!("stored manifest {name} in {}", self.uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AxiomFilter;

    fn write(dir: &Path, name: &str, version: &str) {
        let body = format!(r#"{{"files":[{{"name":"test","version":"{version}"}}]}}"#);
        fs::write(dir.join(name), body).expect("write manifest");
    }

    #[test]
    fn load_enumerates_manifests_in_glob_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(dir.path(), "v2.0.0.meta4", "2.0.0");
        write(dir.path(), "v1.0.0.meta4", "1.0.0");
        fs::write(dir.path().join("README"), "ignored").expect("write");

        let mut source = FileSource::new("file:///repo", dir.path());
        source.load().expect("loads");
        let entries = source.filter(&AxiomFilter).expect("filters");

        let paths: Vec<_> = entries.iter().map(|e| e.reference.path.as_str()).collect();
        assert_eq!(paths, vec!["v1.0.0.meta4", "v2.0.0.meta4"]);
    }

    #[test]
    fn revision_tracks_content() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(dir.path(), "v1.meta4", "1.0.0");
        let mut source = FileSource::new("file:///repo", dir.path());
        source.load().expect("loads");
        let before = source.filter(&AxiomFilter).expect("filters");

        source.load().expect("reloads");
        let unchanged = source.filter(&AxiomFilter).expect("filters");
        write(dir.path(), "v1.meta4", "1.0.1");
        source.load().expect("reloads");
        let changed = source.filter(&AxiomFilter).expect("filters");

        let revision = |entries: &[RepositoryEntry]| {
            entries
                .first()
                .map(|e| e.reference.revision.clone())
                .unwrap_or_default()
        };
        assert_eq!(revision(&before), revision(&unchanged));
        assert_ne!(revision(&before), revision(&changed));
    }

    #[test]
    fn malformed_manifest_names_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("broken.meta4"), "{").expect("write");
        let mut source = FileSource::new("file:///repo", dir.path());

        let err = source.load().expect_err("parse failure");
        assert!(matches!(
            err,
            ResourceError::ManifestParse { ref path, .. } if path == "broken.meta4"
        ));
    }

    #[test]
    fn put_writes_manifest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = dir.path().join("nested");
        let mut source = FileSource::new("file:///repo", &target);

        source.put("v1.meta4", b"<metalink/>").expect("stores");
        assert_eq!(fs::read(target.join("v1.meta4")).expect("read"), b"<metalink/>");
    }
}
