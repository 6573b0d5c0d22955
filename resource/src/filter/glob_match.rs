//! Shell-style glob predicates over base names.

use std::path::Path;

use glob::Pattern;

use super::{Filter, invalid_expression};
use crate::entry::RepositoryEntry;
use crate::error::Result;

/// Matches the base name of an entry's repository path.
#[derive(Clone, Debug)]
pub struct RepositoryPathFilter {
    pattern: Pattern,
}

impl RepositoryPathFilter {
    /// Compile `expression` as a glob.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ResourceError::InvalidPredicateExpression`]
    /// for a malformed pattern.
    pub fn parse(expression: &str) -> Result<Self> {
        let pattern = Pattern::new(expression)
            .map_err(|err| invalid_expression("repositorypath", expression, err))?;
        Ok(Self { pattern })
    }
}

impl Filter for RepositoryPathFilter {
    fn is_true(&self, entry: &RepositoryEntry) -> Result<bool> {
        Ok(self.pattern.matches(base_name(&entry.reference.path)))
    }
}

/// Matches when any file listed in the manifest has a matching base name.
#[derive(Clone, Debug)]
pub struct FileNameFilter {
    pattern: Pattern,
}

impl FileNameFilter {
    /// Compile `expression` as a glob.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ResourceError::InvalidPredicateExpression`]
    /// for a malformed pattern.
    pub fn parse(expression: &str) -> Result<Self> {
        let pattern = Pattern::new(expression)
            .map_err(|err| invalid_expression("filename", expression, err))?;
        Ok(Self { pattern })
    }
}

impl Filter for FileNameFilter {
    fn is_true(&self, entry: &RepositoryEntry) -> Result<bool> {
        Ok(entry
            .manifest
            .files
            .iter()
            .any(|file| self.pattern.matches(base_name(&file.name))))
    }
}

/// The final path component, or the whole value when it has none.
pub(crate) fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::entry;
    use rstest::rstest;

    #[rstest]
    #[case::star("*.meta4", "releases/v1.0.0.meta4", true)]
    #[case::base_name_only("releases/*", "releases/v1.0.0.meta4", false)]
    #[case::question("v?.0.0.meta4", "v1.0.0.meta4", true)]
    #[case::class("v[12].*", "v3.0.0.meta4", false)]
    fn repository_path_matches_base_name(
        #[case] glob: &str,
        #[case] path: &str,
        #[case] expected: bool,
    ) {
        let filter = RepositoryPathFilter::parse(glob).expect("valid glob");
        let result = filter.is_true(&entry(path, "1.0.0", &["a"])).expect("evaluates");
        assert_eq!(result, expected);
    }

    #[test]
    fn file_name_matches_any_file() {
        let filter = FileNameFilter::parse("*d.txt").expect("valid glob");
        let matching = entry("v.meta4", "1.0.0", &["a-first.txt", "a-second.txt"]);
        let missing = entry("v.meta4", "1.0.0", &["a-first.txt"]);

        assert!(filter.is_true(&matching).expect("evaluates"));
        assert!(!filter.is_true(&missing).expect("evaluates"));
    }

    #[test]
    fn invalid_glob_fails_at_construction() {
        assert!(FileNameFilter::parse("[a-").is_err());
    }
}
