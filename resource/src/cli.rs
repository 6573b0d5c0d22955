//! Command-line arguments shared by the `in` and `out` binaries.
//!
//! Both take the working directory as their single positional argument; the
//! request itself arrives on standard input.

use camino::Utf8PathBuf;
use clap::Parser;

/// Arguments of the `in` binary.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "in", version)]
#[command(about = "Fetch a manifest version and its files into a directory")]
pub struct InCli {
    /// Directory receiving the downloaded files.
    pub destination: Utf8PathBuf,
}

/// Arguments of the `out` binary.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "out", version)]
#[command(about = "Publish a manifest from files in a directory")]
pub struct OutCli {
    /// Directory that request paths are relative to.
    pub source_dir: Utf8PathBuf,
}

/// Arguments of the `check` binary.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "check", version)]
#[command(about = "List manifest versions newer than the current one")]
pub struct CheckCli {}
