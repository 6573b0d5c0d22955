//! Version precedence used for filtering and sorting manifests.
//!
//! Values that parse as semantic versions compare by semantic-version
//! precedence (build metadata ignored). Anything else, such as a revision
//! hash standing in for a missing file version, is an opaque token: opaque
//! tokens compare lexically and always rank below semantic versions.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;

/// A comparable version value.
///
/// Equality agrees with ordering: keys differing only in build metadata are
/// equal.
#[derive(Debug, Clone)]
pub enum VersionKey {
    /// A value that parsed as a semantic version.
    Semantic(Version),
    /// Any other non-empty value, compared lexically.
    Opaque(String),
}

impl VersionKey {
    /// Parse a version leniently.
    ///
    /// A leading `v` is ignored and missing minor or patch components default
    /// to zero, so `v1.2` reads as `1.2.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_common::version::VersionKey;
    ///
    /// assert!(VersionKey::parse("v1.2").is_semantic());
    /// assert!(!VersionKey::parse("0f3c9e1").is_semantic());
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        parse_semantic(raw).map_or_else(|| Self::Opaque(raw.trim().to_owned()), Self::Semantic)
    }

    /// Parse a value that must be a semantic version.
    ///
    /// Returns `None` when the value is not a (lenient) semantic version.
    #[must_use]
    pub fn parse_semantic(raw: &str) -> Option<Self> {
        parse_semantic(raw).map(Self::Semantic)
    }

    /// Whether the value parsed as a semantic version.
    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        matches!(self, Self::Semantic(_))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Semantic(left), Self::Semantic(right)) => precedence(left, right),
            (Self::Semantic(_), Self::Opaque(_)) => Ordering::Greater,
            (Self::Opaque(_), Self::Semantic(_)) => Ordering::Less,
            (Self::Opaque(left), Self::Opaque(right)) => left.cmp(right),
        }
    }
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionKey {}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(version) => write!(f, "{version}"),
            Self::Opaque(token) => f.write_str(token),
        }
    }
}

/// Compare two version strings by precedence.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use metalink_common::version::compare_versions;
///
/// assert_eq!(compare_versions("1.2.0", "1.10.0"), Ordering::Less);
/// assert_eq!(compare_versions("2.0.0-alpha", "2.0.0"), Ordering::Less);
/// ```
#[must_use]
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    VersionKey::parse(left).cmp(&VersionKey::parse(right))
}

// Build metadata does not participate in precedence.
fn precedence(left: &Version, right: &Version) -> Ordering {
    (left.major, left.minor, left.patch, &left.pre).cmp(&(
        right.major,
        right.minor,
        right.patch,
        &right.pre,
    ))
}

fn parse_semantic(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let unprefixed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if unprefixed.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(unprefixed) {
        return Some(version);
    }
    Version::parse(&pad_core(unprefixed)).ok()
}

// Expands `1` or `1.2` (with any suffix) to a full `MAJOR.MINOR.PATCH` core.
fn pad_core(value: &str) -> String {
    let split_at = value.find(['-', '+']).unwrap_or(value.len());
    let (core, suffix) = value.split_at(split_at);
    let parts = core.split('.').count();
    let padding = match parts {
        1 => ".0.0",
        2 => ".0",
        _ => "",
    };
    format!("{core}{padding}{suffix}")
}
