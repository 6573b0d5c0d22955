//! The `check` command: discover versions newer than the current one.

use crate::entry::RepositoryEntry;
use crate::error::Result;
use crate::filter::{Comparator, FileVersionFilter, build_and_filter};
use crate::request::{CheckRequest, VersionRef};
use crate::selection::{enumerate_and_filter, sort_latest_first};
use crate::source::{Source, create_source};

/// Run `check` against the source named in `request`.
///
/// # Errors
///
/// Returns configuration errors for invalid filters or sources and the
/// source's load error otherwise.
pub fn check(request: &CheckRequest) -> Result<Vec<VersionRef>> {
    let mut source = create_source(&request.source.uri, &request.source.options)?;
    check_with_source(request, source.as_mut())
}

/// Run `check` against an already constructed source.
///
/// # Errors
///
/// See [`check`].
pub fn check_with_source(
    request: &CheckRequest,
    source: &mut dyn Source,
) -> Result<Vec<VersionRef>> {
    let specs = request.source.filter_specs()?;
    let mut filter = build_and_filter(specs.iter().map(|(k, e)| (k.as_str(), e.as_str())))?;
    let current = request.version.as_ref().map(|v| v.version.as_str());
    if let Some(version) = current {
        filter.add(Box::new(FileVersionFilter::comparing(Comparator::Greater, version)));
    }

    let mut entries = enumerate_and_filter(source, &filter)?;
    sort_latest_first(&mut entries);
    Ok(distinct_versions(&entries, current.is_none()))
}

fn distinct_versions(entries: &[RepositoryEntry], latest_only: bool) -> Vec<VersionRef> {
    let mut versions: Vec<VersionRef> = Vec::new();
    for entry in entries {
        let version = entry.resolved_version();
        if versions.iter().any(|seen| seen.version == version) {
            continue;
        }
        versions.push(VersionRef::new(version));
        if latest_only {
            break;
        }
    }
    log::debug!("check found {} version(s)", versions.len());
    versions
}
