//! Metalink repository resource.
//!
//! This crate discovers, downloads and publishes versioned metalink manifests
//! held in a repository (a git working copy or a local directory). It backs
//! the `check`, `in` and `out` binaries and can be driven programmatically.
//!
//! # Modules
//!
//! - [`check`] - Discovering newer versions
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Request decoding, response encoding and exit codes
//! - [`config`] - Source and handler configuration
//! - [`download`] - Parallel verified download of a selected version
//! - [`entry`] - Enumerated manifests and their resolved versions
//! - [`error`] - Error types and failure categories
//! - [`filter`] - Predicate filters over repository entries
//! - [`git`] - Command execution for git-backed sources
//! - [`handler`] - Transport handlers for file, HTTP, FTP and S3 locations
//! - [`mirror`] - Destination templates and retried mirror uploads
//! - [`progress`] - Byte-count progress sinks
//! - [`publish`] - Building, mirroring and storing manifests
//! - [`request`] - Request and response documents
//! - [`resolver`] - Routing locations to handlers
//! - [`selection`] - Selecting entries and file names
//! - [`signature`] - Ed25519 signature trust store
//! - [`sorter`] - Version ordering of entries
//! - [`source`] - Repository sources
//! - [`transfer`] - Verified single-file transfer
//! - [`verification`] - Digest and signature verification

pub mod check;
pub mod cli;
pub mod commands;
pub mod config;
pub mod download;
pub mod entry;
pub mod error;
pub mod filter;
pub mod git;
pub mod handler;
pub mod mirror;
pub mod progress;
pub mod publish;
pub mod request;
pub mod resolver;
pub mod selection;
pub mod signature;
pub mod sorter;
pub mod source;
pub mod transfer;
pub mod verification;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
