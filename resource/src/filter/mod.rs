//! Predicate filter engine for repository entries.
//!
//! Filters are created from a `(kind, expression)` pair and combined with an
//! [`AndFilter`]. Expressions are validated when the filter is created, so
//! evaluation only fails for entries a predicate cannot interpret.
//!
//! | Kind | Expression |
//! |------|------------|
//! | `axiom` | ignored; always true |
//! | `fileversion` | comparator list, e.g. `>= 1.2.0, < 2.0.0` |
//! | `repositorypath` | glob over the manifest path's base name |
//! | `filename` | glob over the base name of any listed file |

mod axiom;
mod file_version;
mod glob_match;

pub use axiom::AxiomFilter;
pub use file_version::{Comparator, FileVersionFilter};
pub use glob_match::{FileNameFilter, RepositoryPathFilter};

use crate::entry::RepositoryEntry;
use crate::error::{ResourceError, Result};

/// A boolean predicate over repository entries.
#[cfg_attr(test, mockall::automock)]
pub trait Filter: Send + Sync {
    /// Evaluate the predicate.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry cannot be evaluated.
    fn is_true(&self, entry: &RepositoryEntry) -> Result<bool>;
}

/// Conjunction of filters evaluated in insertion order.
///
/// An empty conjunction is always true. Evaluation stops at the first
/// predicate that returns `false` or fails.
#[derive(Default)]
pub struct AndFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AndFilter {
    /// An empty conjunction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate. Duplicates are kept.
    pub fn add(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Number of predicates added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no predicates have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for AndFilter {
    fn is_true(&self, entry: &RepositoryEntry) -> Result<bool> {
        for filter in &self.filters {
            if !filter.is_true(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Create a predicate from a kind name and expression.
///
/// # Errors
///
/// Returns [`ResourceError::InvalidPredicateKind`] for an unknown kind and
/// [`ResourceError::InvalidPredicateExpression`] when the expression does
/// not parse for that kind.
///
/// # Examples
///
/// ```
/// use metalink_resource::filter::create_filter;
///
/// assert!(create_filter("fileversion", ">= 1.0.0").is_ok());
/// assert!(create_filter("fileversion", "~> banana").is_err());
/// assert!(create_filter("colour", "blue").is_err());
/// ```
pub fn create_filter(kind: &str, expression: &str) -> Result<Box<dyn Filter>> {
    match kind {
        "axiom" => Ok(Box::new(AxiomFilter)),
        "fileversion" => Ok(Box::new(FileVersionFilter::parse(expression)?)),
        "repositorypath" => Ok(Box::new(RepositoryPathFilter::parse(expression)?)),
        "filename" => Ok(Box::new(FileNameFilter::parse(expression)?)),
        other => Err(ResourceError::InvalidPredicateKind {
            kind: other.to_owned(),
        }),
    }
}

/// Build a conjunction from `(kind, expression)` pairs.
///
/// # Errors
///
/// Returns the first creation error.
pub fn build_and_filter<'a, I>(specs: I) -> Result<AndFilter>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut and = AndFilter::new();
    for (kind, expression) in specs {
        and.add(create_filter(kind, expression)?);
    }
    Ok(and)
}

pub(crate) fn invalid_expression(
    kind: &str,
    expression: &str,
    reason: impl std::fmt::Display,
) -> ResourceError {
    ResourceError::InvalidPredicateExpression {
        kind: kind.to_owned(),
        expression: expression.to_owned(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entry::EntryReference;
    use metalink_common::{Manifest, ManifestFile};
    use rstest::rstest;

    pub(crate) fn entry(path: &str, version: &str, files: &[&str]) -> RepositoryEntry {
        RepositoryEntry {
            reference: EntryReference {
                repository: "file:///repo".to_owned(),
                path: path.to_owned(),
                revision: "0f3c9e1".to_owned(),
            },
            manifest: Manifest {
                files: files
                    .iter()
                    .map(|name| ManifestFile::new(*name, version))
                    .collect(),
                ..Manifest::default()
            },
        }
    }

    fn mock_returning(result: Result<bool>, times: usize) -> Box<dyn Filter> {
        let mut mock = MockFilter::new();
        let mut slot = Some(result);
        mock.expect_is_true()
            .times(times)
            .returning(move |_| slot.take().unwrap_or(Ok(true)));
        Box::new(mock)
    }

    #[test]
    fn empty_conjunction_is_true() {
        let and = AndFilter::new();
        assert!(and.is_true(&entry("v1.meta4", "1.0.0", &["a"])).expect("evaluates"));
    }

    #[test]
    fn conjunction_short_circuits_on_false() {
        let mut and = AndFilter::new();
        and.add(mock_returning(Ok(true), 1));
        and.add(mock_returning(Ok(false), 1));
        and.add(mock_returning(Ok(true), 0));

        assert!(!and.is_true(&entry("v1.meta4", "1.0.0", &["a"])).expect("evaluates"));
    }

    #[test]
    fn conjunction_stops_at_first_error() {
        let mut and = AndFilter::new();
        and.add(mock_returning(Err(ResourceError::configuration("boom")), 1));
        and.add(mock_returning(Ok(true), 0));

        let err = and
            .is_true(&entry("v1.meta4", "1.0.0", &["a"]))
            .expect_err("propagates");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn conjunction_is_true_when_all_predicates_hold() {
        let mut and = AndFilter::new();
        and.add(mock_returning(Ok(true), 1));
        and.add(mock_returning(Ok(true), 1));
        assert!(and.is_true(&entry("v1.meta4", "1.0.0", &["a"])).expect("evaluates"));
        assert_eq!(and.len(), 2);
    }

    #[rstest]
    #[case::unknown_kind("colour", "blue", "unsupported filter kind")]
    #[case::bad_version("fileversion", ">= one", "invalid fileversion")]
    #[case::bad_glob("repositorypath", "[", "invalid repositorypath")]
    fn create_filter_rejects_bad_input(
        #[case] kind: &str,
        #[case] expression: &str,
        #[case] expected: &str,
    ) {
        let Err(err) = create_filter(kind, expression) else {
            panic!("expected {kind} {expression:?} to be rejected");
        };
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[test]
    fn build_and_filter_combines_specs() {
        let and = build_and_filter([("fileversion", ">= 1.0.0"), ("filename", "*.tgz")])
            .expect("valid specs");
        assert!(and.is_true(&entry("v1.meta4", "1.2.0", &["a.tgz"])).expect("evaluates"));
        assert!(!and.is_true(&entry("v1.meta4", "1.2.0", &["a.zip"])).expect("evaluates"));
    }
}
