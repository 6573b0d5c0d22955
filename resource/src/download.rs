//! Downloading a selected manifest's files into a working directory.
//!
//! Files are fetched by a bounded pool of scoped worker threads. Each worker
//! takes one file at a time from a shared queue and owns its transfer from
//! resolution to verification. The first failure stops workers from taking
//! new files; transfers already under way run to completion. Metadata is only
//! persisted once every worker has joined and all transfers succeeded.

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use metalink_common::{ManifestFile, write_manifest};

use crate::config::DEFAULT_PARALLEL;
use crate::entry::RepositoryEntry;
use crate::error::{ResourceError, Result};
use crate::filter::{Comparator, FileVersionFilter, build_and_filter};
use crate::handler::LocalFile;
use crate::progress::ByteCounter;
use crate::request::{InRequest, InResponse, MetadataField};
use crate::resolver::LocationResolver;
use crate::selection::{FileSelector, enumerate_and_filter, select_exactly_one};
use crate::source::{Source, create_source};
use crate::transfer::VerifiedTransfer;
use crate::verification::{VerificationPolicy, VerificationReporter};

/// Subdirectory of the destination holding persisted metadata.
pub const METADATA_DIR: &str = ".resource";
/// Name of the persisted manifest within [`METADATA_DIR`].
pub const MANIFEST_FILE: &str = "metalink.meta4";
/// Name of the persisted version within [`METADATA_DIR`].
pub const VERSION_FILE: &str = "version";

/// Counts reported after a download.
///
/// Byte counts are the sizes the manifest declares for the selected files,
/// whether or not their content was fetched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Number of selected files.
    pub files: usize,
    /// Total declared size of the selected files.
    pub bytes: u64,
}

/// Fetches the files of one repository entry.
pub struct Downloader<'a> {
    transfer: VerifiedTransfer<'a>,
    selector: FileSelector,
    parallel: usize,
    skip_download: bool,
}

impl<'a> Downloader<'a> {
    /// A downloader fetching every file with the default worker count.
    #[must_use]
    pub fn new(resolver: &'a LocationResolver, policy: &'a VerificationPolicy) -> Self {
        Self {
            transfer: VerifiedTransfer::new(resolver, policy),
            selector: FileSelector::new(),
            parallel: DEFAULT_PARALLEL,
            skip_download: false,
        }
    }

    /// Restrict the download to names `selector` accepts.
    #[must_use]
    pub fn with_selector(mut self, selector: FileSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Use `parallel` workers; zero is treated as one.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Record metadata without fetching file content.
    #[must_use]
    pub const fn skip_download(mut self, skip: bool) -> Self {
        self.skip_download = skip;
        self
    }

    /// Download the selected files of `entry` into `destination`, then
    /// persist the manifest and `version` under [`METADATA_DIR`].
    ///
    /// Verification results are written to `report` once every transfer has
    /// finished.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidManifest`] before anything is written
    /// when a selected file name is not a plain file name, the first transfer
    /// failure, or an I/O error while persisting metadata. Nothing is
    /// persisted when a transfer fails.
    pub fn download(
        &self,
        entry: &RepositoryEntry,
        version: &str,
        destination: &Path,
        report: &mut dyn Write,
    ) -> Result<DownloadSummary> {
        let selected: Vec<&ManifestFile> = entry
            .manifest
            .files
            .iter()
            .filter(|file| self.selector.matches(&file.name))
            .collect();
        for file in &selected {
            file.local_name()?;
        }
        fs::create_dir_all(destination)?;
        let summary = DownloadSummary {
            files: selected.len(),
            bytes: selected.iter().map(|file| file.size).sum(),
        };

        if self.skip_download {
            log::info!("skipping download of {} file(s)", summary.files);
        } else {
            let reporter = VerificationReporter::new();
            let counter = ByteCounter::new();
            self.fetch_all(selected, destination, &counter, &reporter)?;
            log::info!(
                "downloaded {} file(s), {} bytes",
                summary.files,
                counter.total()
            );
            reporter.write_to(report)?;
        }

        persist_metadata(entry, version, destination)?;
        Ok(summary)
    }

    fn fetch_all(
        &self,
        files: Vec<&ManifestFile>,
        destination: &Path,
        counter: &ByteCounter,
        reporter: &VerificationReporter,
    ) -> Result<()> {
        let workers = self.parallel.max(1).min(files.len());
        let queue = Mutex::new(files.into_iter().collect::<VecDeque<_>>());
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<ResourceError>> = Mutex::new(None);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    while !failed.load(Ordering::SeqCst) {
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .pop_front();
                        let Some(file) = next else { break };
                        let local = LocalFile::new(destination.join(&file.name));
                        if let Err(err) =
                            self.transfer.transfer_file(file, &local, counter, reporter)
                        {
                            failed.store(true, Ordering::SeqCst);
                            first_error
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get_or_insert(err);
                        }
                    }
                });
            }
        });

        match first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Run `in`: select the requested version and download it into
/// `destination`.
///
/// # Errors
///
/// Returns configuration errors for invalid filters, globs, handlers or
/// sources, and any error from [`fetch_from`].
pub fn fetch(
    request: &InRequest,
    destination: &Path,
    report: &mut dyn Write,
) -> Result<InResponse> {
    let mut source = create_source(&request.source.uri, &request.source.options)?;
    fetch_from(request, source.as_mut(), destination, report)
}

/// Run `in` against an already constructed source.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] or [`ResourceError::AmbiguousMatch`]
/// unless exactly one manifest carries the requested version, and the first
/// transfer failure otherwise.
pub fn fetch_from(
    request: &InRequest,
    source: &mut dyn Source,
    destination: &Path,
    report: &mut dyn Write,
) -> Result<InResponse> {
    let config = &request.source;
    let version = request.version.version.as_str();
    let policy = VerificationPolicy::from_source(config)?;
    let resolver = LocationResolver::from_configs(&config.handler_configs()?);
    let selector = FileSelector::new()
        .include(&config.include_files)?
        .include(&request.params.include_files)?
        .exclude(&config.exclude_files)?;

    let specs = config.filter_specs()?;
    let mut filter = build_and_filter(specs.iter().map(|(k, e)| (k.as_str(), e.as_str())))?;
    filter.add(Box::new(FileVersionFilter::comparing(Comparator::Equal, version)));
    let matches = enumerate_and_filter(source, &filter)?;
    let entry = select_exactly_one(matches, &format!("version {version}"))?;
    log::info!("fetching {} from {}", entry.reference.path, source.uri());

    let summary = Downloader::new(&resolver, &policy)
        .with_selector(selector)
        .with_parallel(config.parallel)
        .skip_download(request.params.skip_download)
        .download(&entry, version, destination, report)?;

    Ok(InResponse {
        version: request.version.clone(),
        metadata: vec![
            MetadataField::new("files", summary.files),
            MetadataField::new("bytes", summary.bytes),
        ],
    })
}

/// Write the full manifest and the selected version under
/// `destination/.resource`.
///
/// # Errors
///
/// Returns serialization or I/O failures.
pub fn persist_metadata(entry: &RepositoryEntry, version: &str, destination: &Path) -> Result<()> {
    let dir = destination.join(METADATA_DIR);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(MANIFEST_FILE), write_manifest(&entry.manifest)?)?;
    fs::write(dir.join(VERSION_FILE), version)?;
    log::debug!("persisted metadata in {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Source as SourceConfig;
    use crate::entry::EntryReference;
    use crate::request::{InParams, VersionRef};
    use crate::source::FileSource;
    use metalink_common::testing::{FIXTURE_FILES, stage_fixture_manifest};
    use metalink_common::{HashAlgorithm, Manifest, ManifestError, parse_manifest};
    use rstest::rstest;

    struct Staged {
        _remote: tempfile::TempDir,
        destination: tempfile::TempDir,
        entry: RepositoryEntry,
    }

    fn staged() -> Staged {
        let remote = tempfile::tempdir().expect("remote dir");
        let manifest =
            stage_fixture_manifest(remote.path(), "0.1.0", &FIXTURE_FILES).expect("fixtures");
        Staged {
            _remote: remote,
            destination: tempfile::tempdir().expect("destination"),
            entry: RepositoryEntry {
                reference: EntryReference {
                    repository: "file:///repo".to_owned(),
                    path: "v0.1.0.meta4".to_owned(),
                    revision: "0f3c9e1".to_owned(),
                },
                manifest,
            },
        }
    }

    fn include(patterns: &[&str]) -> FileSelector {
        let owned: Vec<String> = patterns.iter().map(|p| (*p).to_owned()).collect();
        FileSelector::new().include(&owned).expect("valid globs")
    }

    #[rstest]
    #[case::single_worker(1)]
    #[case::default_workers(DEFAULT_PARALLEL)]
    #[case::more_workers_than_files(8)]
    fn downloads_every_file(#[case] parallel: usize) {
        let staged = staged();
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();
        let mut report = Vec::new();

        let summary = Downloader::new(&resolver, &policy)
            .with_parallel(parallel)
            .download(&staged.entry, "0.1.0", staged.destination.path(), &mut report)
            .expect("downloads");

        assert_eq!(summary, DownloadSummary { files: 3, bytes: 37 });
        for fixture in FIXTURE_FILES {
            let body = fs::read(staged.destination.path().join(fixture.name)).expect("file");
            assert_eq!(body, fixture.contents);
        }
        let text = String::from_utf8(report).expect("utf-8");
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("a-first.txt: sha-512 digest OK"));
    }

    #[test]
    fn persists_manifest_and_version() {
        let staged = staged();
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        Downloader::new(&resolver, &policy)
            .download(&staged.entry, "0.1.0", staged.destination.path(), &mut Vec::new())
            .expect("downloads");

        let meta = staged.destination.path().join(METADATA_DIR);
        let version = fs::read_to_string(meta.join(VERSION_FILE)).expect("version");
        assert_eq!(version, "0.1.0");
        let manifest = parse_manifest(&fs::read(meta.join(MANIFEST_FILE)).expect("manifest"))
            .expect("parses");
        assert_eq!(manifest.files.len(), 3);
    }

    #[test]
    fn selector_limits_downloaded_files() {
        let staged = staged();
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        let summary = Downloader::new(&resolver, &policy)
            .with_selector(include(&["*d.txt"]))
            .download(&staged.entry, "0.1.0", staged.destination.path(), &mut Vec::new())
            .expect("downloads");

        assert_eq!(summary, DownloadSummary { files: 2, bytes: 25 });
        assert!(!staged.destination.path().join("a-first.txt").exists());
        assert!(staged.destination.path().join("a-third.txt").exists());
    }

    #[test]
    fn skip_download_still_counts_and_persists() {
        let staged = staged();
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();
        let mut report = Vec::new();

        let summary = Downloader::new(&resolver, &policy)
            .skip_download(true)
            .download(&staged.entry, "0.1.0", staged.destination.path(), &mut report)
            .expect("records metadata");

        assert_eq!(summary, DownloadSummary { files: 3, bytes: 37 });
        assert!(report.is_empty());
        assert!(!staged.destination.path().join("a-first.txt").exists());
        assert!(
            staged
                .destination
                .path()
                .join(METADATA_DIR)
                .join(VERSION_FILE)
                .exists()
        );
    }

    #[rstest]
    #[case::absolute(true)]
    #[case::parent(false)]
    fn names_outside_destination_are_refused(#[case] absolute: bool) {
        let mut staged = staged();
        let outside = tempfile::tempdir().expect("outside dir");
        let escaped = outside.path().join("escaped.txt");
        let name = if absolute {
            escaped.display().to_string()
        } else {
            format!(
                "../{}/escaped.txt",
                outside.path().file_name().and_then(|n| n.to_str()).expect("utf-8 name")
            )
        };
        if let Some(file) = staged.entry.manifest.files.get_mut(1) {
            file.name = name;
        }
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        let err = Downloader::new(&resolver, &policy)
            .download(&staged.entry, "0.1.0", staged.destination.path(), &mut Vec::new())
            .expect_err("unsafe name");

        assert!(
            matches!(
                err,
                ResourceError::InvalidManifest(ManifestError::UnsafeFileName { .. })
            ),
            "{err}"
        );
        assert!(!escaped.exists());
        assert!(!staged.destination.path().join("a-first.txt").exists());
        assert!(!staged.destination.path().join(METADATA_DIR).exists());
    }

    #[test]
    fn failed_transfer_persists_nothing() {
        let mut staged = staged();
        if let Some(file) = staged.entry.manifest.files.get_mut(1) {
            file.hashes.clear();
            file.set_hash(HashAlgorithm::Sha512, "00".repeat(64));
        }
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        let err = Downloader::new(&resolver, &policy)
            .with_parallel(1)
            .download(&staged.entry, "0.1.0", staged.destination.path(), &mut Vec::new())
            .expect_err("mismatch");

        assert_eq!(err.category(), "integrity");
        assert!(!staged.destination.path().join(METADATA_DIR).exists());
    }

    fn repository_with(staged: &Staged, versions: &[&str]) -> (tempfile::TempDir, FileSource) {
        let dir = tempfile::tempdir().expect("repository");
        for version in versions {
            let mut manifest = staged.entry.manifest.clone();
            for file in &mut manifest.files {
                file.version = (*version).to_owned();
            }
            let bytes = write_manifest(&manifest).expect("serializes");
            fs::write(dir.path().join(format!("v{version}.meta4")), bytes).expect("write");
        }
        let source = FileSource::new("file:///repo", dir.path());
        (dir, source)
    }

    fn in_request(version: &str, include: &[&str]) -> InRequest {
        InRequest {
            source: SourceConfig::new("file:///repo"),
            version: VersionRef::new(version),
            params: InParams {
                skip_download: false,
                include_files: include.iter().map(|p| (*p).to_owned()).collect(),
            },
        }
    }

    #[test]
    fn fetch_reports_counts_as_metadata() {
        let staged = staged();
        let (_repo, mut source) = repository_with(&staged, &["0.1.0", "0.2.0"]);

        let response = fetch_from(
            &in_request("0.1.0", &[]),
            &mut source,
            staged.destination.path(),
            &mut Vec::new(),
        )
        .expect("fetches");

        assert_eq!(
            response.metadata,
            vec![MetadataField::new("files", 3), MetadataField::new("bytes", 37)]
        );
        let version = fs::read_to_string(
            staged.destination.path().join(METADATA_DIR).join(VERSION_FILE),
        )
        .expect("version");
        assert_eq!(version, "0.1.0");
    }

    #[test]
    fn fetch_applies_request_include_files() {
        let staged = staged();
        let (_repo, mut source) = repository_with(&staged, &["0.1.0"]);

        let response = fetch_from(
            &in_request("0.1.0", &["*d.txt"]),
            &mut source,
            staged.destination.path(),
            &mut Vec::new(),
        )
        .expect("fetches");

        assert_eq!(
            response.metadata,
            vec![MetadataField::new("files", 2), MetadataField::new("bytes", 25)]
        );
    }

    #[rstest]
    #[case::missing(&["0.2.0"], "not found")]
    #[case::duplicated(&["0.1.0", "0.1.0+build"], "ambiguous match")]
    fn fetch_requires_exactly_one_match(#[case] versions: &[&str], #[case] category: &str) {
        let staged = staged();
        let (_repo, mut source) = repository_with(&staged, versions);

        let err = fetch_from(
            &in_request("0.1.0", &[]),
            &mut source,
            staged.destination.path(),
            &mut Vec::new(),
        )
        .expect_err("not exactly one");
        assert_eq!(err.category(), category);
    }

    #[test]
    fn empty_manifest_downloads_nothing() {
        let destination = tempfile::tempdir().expect("destination");
        let entry = RepositoryEntry {
            reference: EntryReference {
                repository: "file:///repo".to_owned(),
                path: "empty.meta4".to_owned(),
                revision: "0f3c9e1".to_owned(),
            },
            manifest: Manifest::default(),
        };
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        let summary = Downloader::new(&resolver, &policy)
            .download(&entry, "0f3c9e1", destination.path(), &mut Vec::new())
            .expect("nothing to do");
        assert_eq!(summary, DownloadSummary::default());
    }
}
