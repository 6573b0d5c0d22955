//! The identity predicate.

use super::Filter;
use crate::entry::RepositoryEntry;
use crate::error::Result;

/// A predicate that accepts every entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct AxiomFilter;

impl Filter for AxiomFilter {
    fn is_true(&self, _entry: &RepositoryEntry) -> Result<bool> {
        Ok(true)
    }
}
