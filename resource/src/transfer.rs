//! Verified download of a single manifest file.

use metalink_common::{Location, ManifestFile};

use crate::error::{ResourceError, Result};
use crate::handler::FileReference;
use crate::progress::ProgressSink;
use crate::resolver::LocationResolver;
use crate::verification::{VerificationPolicy, VerificationReporter};

/// Downloads files from their declared locations and verifies them.
pub struct VerifiedTransfer<'a> {
    resolver: &'a LocationResolver,
    policy: &'a VerificationPolicy,
}

impl<'a> VerifiedTransfer<'a> {
    /// A transfer resolving locations with `resolver` and checking results
    /// against `policy`.
    #[must_use]
    pub const fn new(resolver: &'a LocationResolver, policy: &'a VerificationPolicy) -> Self {
        Self { resolver, policy }
    }

    /// Write `file` into `local` from the first location a handler accepts,
    /// then verify the written bytes. Returns the number of bytes written.
    ///
    /// Locations are tried in priority order (lowest value first, then
    /// unprioritized in declaration order). Only resolution failures move on
    /// to the next location; a failed transfer is final.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::FileTransfer`] wrapping the transport or
    /// integrity failure.
    pub fn transfer_file(
        &self,
        file: &ManifestFile,
        local: &dyn FileReference,
        progress: &dyn ProgressSink,
        reporter: &VerificationReporter,
    ) -> Result<u64> {
        self.transfer_unwrapped(file, local, progress, reporter)
            .map_err(|cause| ResourceError::FileTransfer {
                file: file.name.clone(),
                cause: Box::new(cause),
            })
    }

    fn transfer_unwrapped(
        &self,
        file: &ManifestFile,
        local: &dyn FileReference,
        progress: &dyn ProgressSink,
        reporter: &VerificationReporter,
    ) -> Result<u64> {
        let remote = self.resolve_remote(file)?;
        log::info!("downloading {} from {}", file.name, remote.reader_uri());
        let written = local.write_from(remote.as_ref(), progress)?;
        self.policy.verify(file, local, reporter)?;
        Ok(written)
    }

    fn resolve_remote(&self, file: &ManifestFile) -> Result<Box<dyn FileReference>> {
        let mut last_error = None;
        for location in by_priority(&file.locations) {
            match self.resolver.resolve(&location.url) {
                Ok(remote) => return Ok(remote),
                Err(err) => {
                    log::debug!("skipping {}: {err}", location.url);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            ResourceError::transport(&file.name, "file declares no locations")
        }))
    }
}

/// Locations ordered by ascending priority; ties keep declaration order.
fn by_priority(locations: &[Location]) -> Vec<&Location> {
    let mut ordered: Vec<&Location> = locations.iter().collect();
    ordered.sort_by_key(|location| location.priority.unwrap_or(u32::MAX));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::LocalFile;
    use crate::progress::ByteCounter;
    use metalink_common::HashAlgorithm;
    use metalink_common::testing::FIRST_FILE;
    use std::fs;

    struct Staged {
        _dir: tempfile::TempDir,
        file: ManifestFile,
        target: LocalFile,
    }

    fn staged() -> Staged {
        let dir = tempfile::tempdir().expect("temp dir");
        let remote_dir = dir.path().join("remote");
        fs::create_dir_all(&remote_dir).expect("remote dir");
        let path = FIRST_FILE.write_into(&remote_dir).expect("fixture");
        let file = FIRST_FILE.manifest_entry("0.1.0", &format!("file://{}", path.display()));
        let target = LocalFile::new(dir.path().join("local").join(FIRST_FILE.name));
        Staged {
            _dir: dir,
            file,
            target,
        }
    }

    #[test]
    fn downloads_and_verifies() {
        let staged = staged();
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();
        let counter = ByteCounter::new();
        let reporter = VerificationReporter::new();

        let written = VerifiedTransfer::new(&resolver, &policy)
            .transfer_file(&staged.file, &staged.target, &counter, &reporter)
            .expect("transfers");

        assert_eq!(written, 12);
        assert_eq!(counter.total(), 12);
        assert_eq!(reporter.lines().len(), 1);
    }

    #[test]
    fn unresolvable_locations_are_skipped() {
        let mut staged = staged();
        let mut preferred = Location::new("gopher://example.com/a-first.txt");
        preferred.priority = Some(1);
        staged.file.locations.insert(0, preferred);
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        VerifiedTransfer::new(&resolver, &policy)
            .transfer_file(
                &staged.file,
                &staged.target,
                &ByteCounter::new(),
                &VerificationReporter::new(),
            )
            .expect("falls back to the file location");
    }

    #[test]
    fn mismatch_is_wrapped_with_file_name() {
        let mut staged = staged();
        staged.file.hashes.clear();
        staged.file.set_hash(HashAlgorithm::Sha512, "00".repeat(64));
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        let err = VerifiedTransfer::new(&resolver, &policy)
            .transfer_file(
                &staged.file,
                &staged.target,
                &ByteCounter::new(),
                &VerificationReporter::new(),
            )
            .expect_err("mismatch");
        assert!(err.to_string().contains("a-first.txt"));
        assert_eq!(err.category(), "integrity");
    }

    #[test]
    fn file_without_locations_fails() {
        let mut staged = staged();
        staged.file.locations.clear();
        let resolver = LocationResolver::default();
        let policy = VerificationPolicy::default();

        let err = VerifiedTransfer::new(&resolver, &policy)
            .transfer_file(
                &staged.file,
                &staged.target,
                &ByteCounter::new(),
                &VerificationReporter::new(),
            )
            .expect_err("no locations");
        assert_eq!(err.category(), "transport");
    }

    #[test]
    fn priority_orders_locations() {
        let mut low = Location::new("b");
        low.priority = Some(2);
        let mut high = Location::new("a");
        high.priority = Some(1);
        let unranked = Location::new("c");
        let locations = [unranked, low, high];
        let urls: Vec<_> = by_priority(&locations).iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }
}
