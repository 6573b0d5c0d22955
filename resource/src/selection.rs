//! Selecting manifests and the files within them.

use glob::Pattern;

use crate::entry::RepositoryEntry;
use crate::error::{ResourceError, Result};
use crate::filter::Filter;
use crate::sorter::{FileVersionSorter, Reverse, sort};
use crate::source::Source;

/// Load `source` and return the entries `filter` accepts, in enumeration
/// order.
///
/// # Errors
///
/// Returns the source's load error or the first predicate failure.
pub fn enumerate_and_filter(
    source: &mut dyn Source,
    filter: &dyn Filter,
) -> Result<Vec<RepositoryEntry>> {
    source.load()?;
    let entries = source.filter(filter)?;
    log::debug!("{} manifests match in {}", entries.len(), source.uri());
    Ok(entries)
}

/// Sort `entries` newest first.
pub fn sort_latest_first(entries: &mut [RepositoryEntry]) {
    sort(entries, &Reverse(FileVersionSorter));
}

/// The newest entry; the earliest enumerated wins among equal versions.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] when `entries` is empty.
pub fn select_latest(mut entries: Vec<RepositoryEntry>) -> Result<RepositoryEntry> {
    sort_latest_first(&mut entries);
    entries
        .into_iter()
        .next()
        .ok_or_else(|| ResourceError::NotFound {
            what: "matching manifest".to_owned(),
        })
}

/// The single entry in `entries`.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] for none and
/// [`ResourceError::AmbiguousMatch`] for more than one.
pub fn select_exactly_one(entries: Vec<RepositoryEntry>, what: &str) -> Result<RepositoryEntry> {
    let count = entries.len();
    let mut iter = entries.into_iter();
    match (iter.next(), count) {
        (Some(entry), 1) => Ok(entry),
        (None, _) => Err(ResourceError::NotFound {
            what: what.to_owned(),
        }),
        _ => Err(ResourceError::AmbiguousMatch {
            what: what.to_owned(),
            count,
        }),
    }
}

/// Include and exclude globs applied to file base names.
///
/// A name must match one pattern of every non-empty include list and no
/// exclude pattern.
#[derive(Clone, Debug, Default)]
pub struct FileSelector {
    include_sets: Vec<Vec<Pattern>>,
    exclude: Vec<Pattern>,
}

impl FileSelector {
    /// A selector admitting every name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a match against one of `patterns`; an empty list adds no
    /// constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] for an invalid glob.
    pub fn include(mut self, patterns: &[String]) -> Result<Self> {
        let compiled = compile("include_files", patterns)?;
        if !compiled.is_empty() {
            self.include_sets.push(compiled);
        }
        Ok(self)
    }

    /// Reject names matching any of `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] for an invalid glob.
    pub fn exclude(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude.extend(compile("exclude_files", patterns)?);
        Ok(self)
    }

    /// Whether `name` is selected.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let included = self
            .include_sets
            .iter()
            .all(|set| set.iter().any(|pattern| pattern.matches(name)));
        included && !self.exclude.iter().any(|pattern| pattern.matches(name))
    }
}

fn compile(field: &str, patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|err| {
                ResourceError::configuration(format!("{field} pattern {pattern:?}: {err}"))
            })
        })
        .collect()
}
