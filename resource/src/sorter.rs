//! Deterministic ordering of repository entries.
//!
//! Sorting is stable: entries with equal versions keep their enumeration
//! order, so "first match wins" selection repeats across runs.

use std::cmp::Ordering;

use metalink_common::VersionKey;

use crate::entry::RepositoryEntry;

/// An ordering over repository entries.
pub trait Sorter {
    /// Compare two entries.
    fn compare(&self, left: &RepositoryEntry, right: &RepositoryEntry) -> Ordering;
}

/// Ascending order by resolved version precedence.
///
/// Entries without a file version fall back to their revision token, which
/// ranks below every semantic version.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileVersionSorter;

impl Sorter for FileVersionSorter {
    fn compare(&self, left: &RepositoryEntry, right: &RepositoryEntry) -> Ordering {
        VersionKey::parse(left.resolved_version()).cmp(&VersionKey::parse(right.resolved_version()))
    }
}

/// Inverts the wrapped ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reverse<S>(pub S);

impl<S: Sorter> Sorter for Reverse<S> {
    fn compare(&self, left: &RepositoryEntry, right: &RepositoryEntry) -> Ordering {
        self.0.compare(left, right).reverse()
    }
}

/// Stable in-place sort.
pub fn sort<S: Sorter + ?Sized>(entries: &mut [RepositoryEntry], sorter: &S) {
    entries.sort_by(|left, right| sorter.compare(left, right));
}
