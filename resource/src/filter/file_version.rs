//! Version comparison predicates.

use std::cmp::Ordering;

use metalink_common::VersionKey;
use semver::Version;

use super::{Filter, invalid_expression};
use crate::entry::RepositoryEntry;
use crate::error::Result;

const KIND: &str = "fileversion";

/// A single comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl Comparator {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => matches!(ordering, Ordering::Equal),
            Self::NotEqual => !matches!(ordering, Ordering::Equal),
            Self::Greater => matches!(ordering, Ordering::Greater),
            Self::GreaterOrEqual => !matches!(ordering, Ordering::Less),
            Self::Less => matches!(ordering, Ordering::Less),
            Self::LessOrEqual => !matches!(ordering, Ordering::Greater),
        }
    }
}

#[derive(Clone, Debug)]
struct Constraint {
    comparator: Comparator,
    version: VersionKey,
}

impl Constraint {
    fn accepts(&self, actual: &VersionKey) -> bool {
        self.comparator.accepts(actual.cmp(&self.version))
    }
}

/// Matches entries whose resolved version satisfies every constraint.
///
/// Constraints are comma-separated; each is an optional operator (`=`,
/// `!=`, `>`, `>=`, `<`, `<=`, `^`, `~`) followed by a semantic version.
/// A bare version means `=`.
#[derive(Clone, Debug)]
pub struct FileVersionFilter {
    constraints: Vec<Constraint>,
}

impl FileVersionFilter {
    /// Parse a constraint list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ResourceError::InvalidPredicateExpression`]
    /// when a part is empty or its version is not a semantic version.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_resource::filter::FileVersionFilter;
    ///
    /// assert!(FileVersionFilter::parse(">= 1.0.0, < 2.0.0").is_ok());
    /// assert!(FileVersionFilter::parse("> latest").is_err());
    /// ```
    pub fn parse(expression: &str) -> Result<Self> {
        let mut constraints = Vec::new();
        for part in expression.split(',') {
            constraints.extend(parse_part(expression, part.trim())?);
        }
        Ok(Self { constraints })
    }

    /// A single constraint against `version`, which may be a revision token
    /// as well as a semantic version.
    #[must_use]
    pub fn comparing(comparator: Comparator, version: &str) -> Self {
        Self {
            constraints: vec![Constraint {
                comparator,
                version: VersionKey::parse(version),
            }],
        }
    }
}

impl Filter for FileVersionFilter {
    fn is_true(&self, entry: &RepositoryEntry) -> Result<bool> {
        let actual = VersionKey::parse(entry.resolved_version());
        Ok(self
            .constraints
            .iter()
            .all(|constraint| constraint.accepts(&actual)))
    }
}

fn parse_part(expression: &str, part: &str) -> Result<Vec<Constraint>> {
    if part.is_empty() {
        return Err(invalid_expression(KIND, expression, "empty constraint"));
    }
    let (operator, raw_version) = split_operator(part);
    let Some(VersionKey::Semantic(version)) = VersionKey::parse_semantic(raw_version) else {
        return Err(invalid_expression(
            KIND,
            expression,
            format!("{raw_version:?} is not a semantic version"),
        ));
    };
    let bound = match operator {
        "^" => caret_upper_bound(&version),
        "~" => tilde_upper_bound(&version),
        _ => {
            return Ok(vec![Constraint {
                comparator: comparator_for(operator),
                version: VersionKey::Semantic(version),
            }]);
        }
    };
    let upper = bound.ok_or_else(|| {
        invalid_expression(
            KIND,
            expression,
            format!("{raw_version:?} has no upper bound for {operator}"),
        )
    })?;
    Ok(range(version, upper))
}

fn split_operator(part: &str) -> (&str, &str) {
    const OPERATORS: [&str; 8] = [">=", "<=", "!=", "=", ">", "<", "^", "~"];
    for operator in OPERATORS {
        if let Some(rest) = part.strip_prefix(operator) {
            return (operator, rest.trim());
        }
    }
    ("=", part)
}

fn comparator_for(operator: &str) -> Comparator {
    match operator {
        "!=" => Comparator::NotEqual,
        ">" => Comparator::Greater,
        ">=" => Comparator::GreaterOrEqual,
        "<" => Comparator::Less,
        "<=" => Comparator::LessOrEqual,
        _ => Comparator::Equal,
    }
}

fn range(lower: Version, upper: Version) -> Vec<Constraint> {
    vec![
        Constraint {
            comparator: Comparator::GreaterOrEqual,
            version: VersionKey::Semantic(lower),
        },
        Constraint {
            comparator: Comparator::Less,
            version: VersionKey::Semantic(upper),
        },
    ]
}

// `None` when the bumped component would overflow.
fn caret_upper_bound(version: &Version) -> Option<Version> {
    if version.major > 0 {
        Some(Version::new(version.major.checked_add(1)?, 0, 0))
    } else if version.minor > 0 {
        Some(Version::new(0, version.minor.checked_add(1)?, 0))
    } else {
        Some(Version::new(0, 0, version.patch.checked_add(1)?))
    }
}

fn tilde_upper_bound(version: &Version) -> Option<Version> {
    Some(Version::new(version.major, version.minor.checked_add(1)?, 0))
}
