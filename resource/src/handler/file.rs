//! Local filesystem handlers.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use url::Url;

use super::{FileReference, Handler, copy_with_progress};
use crate::error::{ResourceError, Result};
use crate::progress::ProgressSink;

/// Resolves `file://` URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileHandler;

impl Handler for FileHandler {
    fn name(&self) -> &'static str {
        "file"
    }

    fn supports(&self, url: &str) -> bool {
        url.starts_with("file://")
    }

    fn resolve(&self, url: &str) -> Result<Box<dyn FileReference>> {
        let path = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.to_file_path().ok())
            .or_else(|| url.strip_prefix("file://").map(PathBuf::from))
            .ok_or_else(|| ResourceError::transport(url, "not a local file url"))?;
        Ok(Box::new(LocalFile::new(path)))
    }
}

/// Treats locations without a scheme as local paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySchemeHandler;

impl Handler for EmptySchemeHandler {
    fn name(&self) -> &'static str {
        "empty-scheme"
    }

    fn supports(&self, url: &str) -> bool {
        !url.is_empty() && !url.contains("://")
    }

    fn resolve(&self, url: &str) -> Result<Box<dyn FileReference>> {
        Ok(Box::new(LocalFile::new(url)))
    }
}

/// A file on the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

impl LocalFile {
    /// Reference `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    /// The referenced path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileReference for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Result<u64> {
        fs::metadata(&self.path)
            .map(|metadata| metadata.len())
            .map_err(|err| ResourceError::transport(self.reader_uri(), err))
    }

    fn reader(&self) -> Result<Box<dyn Read>> {
        let file =
            File::open(&self.path).map_err(|err| ResourceError::transport(self.reader_uri(), err))?;
        Ok(Box::new(file))
    }

    fn reader_uri(&self) -> String {
        let absolute = std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone());
        Url::from_file_path(&absolute)
            .map_or_else(|()| format!("file://{}", absolute.display()), String::from)
    }

    fn write_from(&self, source: &dyn FileReference, progress: &dyn ProgressSink) -> Result<u64> {
        let target = self.reader_uri();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| ResourceError::transport(&target, err))?;
        }
        let mut file =
            File::create(&self.path).map_err(|err| ResourceError::transport(&target, err))?;
        let written = copy_with_progress(source, &self.name, &mut file, progress)?;
        file.sync_all()
            .map_err(|err| ResourceError::transport(&target, err))?;
        log::debug!("wrote {written} bytes to {}", self.path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ByteCounter;
    use rstest::rstest;

    #[rstest]
    #[case::file_url(&FileHandler as &dyn Handler, "file:///srv/a.txt", true)]
    #[case::file_rejects_http(&FileHandler as &dyn Handler, "http://example.com/a.txt", false)]
    #[case::bare_path(&EmptySchemeHandler as &dyn Handler, "/srv/a.txt", true)]
    #[case::relative_path(&EmptySchemeHandler as &dyn Handler, "a.txt", true)]
    #[case::schemed(&EmptySchemeHandler as &dyn Handler, "s3://bucket/a.txt", false)]
    fn handlers_recognize_their_locations(
        #[case] handler: &dyn Handler,
        #[case] url: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(handler.supports(url), expected);
    }

    #[test]
    fn write_from_copies_bytes_and_creates_parents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source_path = dir.path().join("a-first.txt");
        fs::write(&source_path, b"a first file").expect("write source");
        let source = LocalFile::new(&source_path);
        let target = LocalFile::new(dir.path().join("nested/out/a-first.txt"));
        let counter = ByteCounter::new();

        let written = target.write_from(&source, &counter).expect("copies");

        assert_eq!(written, 12);
        assert_eq!(counter.total(), 12);
        assert_eq!(target.size().expect("size"), 12);
        assert_eq!(target.name(), "a-first.txt");
    }

    #[test]
    fn file_urls_round_trip_through_reader_uri() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("with space.txt");
        fs::write(&path, b"x").expect("write");
        let reference = LocalFile::new(&path);

        let uri = reference.reader_uri();
        let resolved = FileHandler.resolve(&uri).expect("resolves");
        assert_eq!(resolved.size().expect("size"), 1);
        assert_eq!(resolved.name(), "with space.txt");
    }

    #[test]
    fn missing_file_is_a_transport_error() {
        let reference = LocalFile::new("/definitely/not/here.txt");
        let err = reference.reader().err().expect("missing file");
        assert_eq!(err.category(), "transport");
    }
}
