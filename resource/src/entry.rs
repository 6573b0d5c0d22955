//! Enumerated manifests tagged with their origin.

use metalink_common::Manifest;

/// Where an enumerated manifest came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryReference {
    /// URI of the repository that produced the entry.
    pub repository: String,
    /// Manifest path relative to the repository's manifest directory.
    pub path: String,
    /// Opaque token identifying the manifest's last change.
    pub revision: String,
}

/// One manifest plus the metadata its source assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryEntry {
    /// Origin metadata.
    pub reference: EntryReference,
    /// Parsed manifest content.
    pub manifest: Manifest,
}

impl RepositoryEntry {
    /// The version used for comparison and selection.
    ///
    /// This is the first non-empty file version, falling back to the
    /// revision token when no file declares a version.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_common::Manifest;
    /// use metalink_resource::entry::{EntryReference, RepositoryEntry};
    ///
    /// let entry = RepositoryEntry {
    ///     reference: EntryReference {
    ///         repository: "file:///tmp/repo".to_owned(),
    ///         path: "v1.meta4".to_owned(),
    ///         revision: "0f3c9e1".to_owned(),
    ///     },
    ///     manifest: Manifest::default(),
    /// };
    /// assert_eq!(entry.resolved_version(), "0f3c9e1");
    /// ```
    #[must_use]
    pub fn resolved_version(&self) -> &str {
        self.manifest
            .version()
            .unwrap_or(self.reference.revision.as_str())
    }
}
