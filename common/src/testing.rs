//! Fixture helpers shared by unit and behavioural tests.
//!
//! Available under `cfg(test)` and the `test-support` feature.
#![cfg(any(test, feature = "test-support"))]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::hash::HashAlgorithm;
use crate::manifest::{Location, Manifest, ManifestFile};
use crate::manifest_parser::write_manifest;

/// A canned payload with a known name and content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureFile {
    /// Base name of the file.
    pub name: &'static str,
    /// File content.
    pub contents: &'static [u8],
}

/// 12 bytes.
pub const FIRST_FILE: FixtureFile = FixtureFile {
    name: "a-first.txt",
    contents: b"a first file",
};

/// 13 bytes.
pub const SECOND_FILE: FixtureFile = FixtureFile {
    name: "a-second.txt",
    contents: b"a second file",
};

/// 12 bytes.
pub const THIRD_FILE: FixtureFile = FixtureFile {
    name: "a-third.txt",
    contents: b"a third file",
};

/// The three fixture files in manifest order.
pub const FIXTURE_FILES: [FixtureFile; 3] = [FIRST_FILE, SECOND_FILE, THIRD_FILE];

impl FixtureFile {
    /// Write the file into `dir`, returning its path.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while writing.
    pub fn write_into(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(self.name);
        fs::write(&path, self.contents)?;
        Ok(path)
    }

    /// A manifest entry locating this file at `location_url`.
    #[must_use]
    pub fn manifest_entry(&self, version: &str, location_url: &str) -> ManifestFile {
        let mut file = ManifestFile::new(self.name, version);
        file.size = u64::try_from(self.contents.len()).unwrap_or(u64::MAX);
        file.set_hash(
            HashAlgorithm::Sha512,
            HashAlgorithm::Sha512.digest_bytes(self.contents),
        );
        file.locations.push(Location::new(location_url));
        file
    }
}

/// Write `files` into `dir` and describe them in a manifest with `file://`
/// locations.
///
/// # Errors
///
/// Returns any I/O error raised while writing.
pub fn stage_fixture_manifest(
    dir: &Path,
    version: &str,
    files: &[FixtureFile],
) -> io::Result<Manifest> {
    let mut manifest = Manifest::default();
    for fixture in files {
        let path = fixture.write_into(dir)?;
        let url = format!("file://{}", path.display());
        manifest.files.push(fixture.manifest_entry(version, &url));
    }
    Ok(manifest)
}

/// Whether a usable `git` binary is on `PATH`.
#[must_use]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A scratch git repository holding manifests.
///
/// The repository accepts pushes to its checked-out branch so it can act
/// as a remote for publishing tests.
#[derive(Debug)]
pub struct RepositoryGenerator {
    dir: TempDir,
}

impl RepositoryGenerator {
    /// Initialise an empty repository with a committer identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or `git` fails.
    pub fn init() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("metalink-repository-fixture")
            .tempdir()?;
        let generator = Self { dir };
        generator.git(&["init", "."])?;
        generator.git(&["config", "receive.denyCurrentBranch", "updateInstead"])?;
        generator.git(&["config", "user.email", "testing@localhost"])?;
        generator.git(&["config", "user.name", "testing"])?;
        generator.git(&["config", "commit.gpgsign", "false"])?;
        Ok(generator)
    }

    /// A repository with `component/v1.0.0.meta4`, `v2.0.0` and `v1.1.0`
    /// committed in that order, each describing one file named `test`.
    ///
    /// # Errors
    ///
    /// Returns an error when the repository cannot be generated.
    pub fn with_component_versions() -> io::Result<Self> {
        let generator = Self::init()?;
        for version in ["1.0.0", "2.0.0", "1.1.0"] {
            let body = format!(r#"{{"files":[{{"name":"test","version":"{version}"}}]}}"#);
            generator.write(&format!("component/v{version}.meta4"), body.as_bytes())?;
        }
        generator.commit("init")?;
        Ok(generator)
    }

    /// Path of the repository working tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the repository root, creating parents.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while writing.
    pub fn write(&self, relative: &str, contents: &[u8]) -> io::Result<()> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    /// Serialize `manifest` as XML at `relative`.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or writing fails.
    pub fn write_manifest(&self, relative: &str, manifest: &Manifest) -> io::Result<()> {
        let bytes = write_manifest(manifest).map_err(io::Error::other)?;
        self.write(relative, &bytes)
    }

    /// Stage everything and commit.
    ///
    /// # Errors
    ///
    /// Returns an error when `git` fails.
    pub fn commit(&self, message: &str) -> io::Result<()> {
        self.git(&["add", "."])?;
        self.git(&["commit", "-q", "-m", message])
    }

    /// The full hash of the commit that last touched `relative`.
    ///
    /// # Errors
    ///
    /// Returns an error when `git` fails.
    pub fn last_commit_for(&self, relative: &str) -> io::Result<String> {
        let output = Command::new("git")
            .args(["log", "--pretty=format:%H", "-n1", "--", relative])
            .current_dir(self.dir.path())
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn git(&self, args: &[&str]) -> io::Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()?;
        if output.status.success() {
            return Ok(());
        }
        Err(io::Error::other(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
