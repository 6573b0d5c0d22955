//! Git-backed repository source.
//!
//! The working copy lives in a cache directory named from a digest of the
//! configured URI, so repeated invocations refresh one clone instead of
//! cloning again. An advisory lock file keeps concurrent invocations from
//! sharing the working copy.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use metalink_common::HashAlgorithm;

use super::{
    MANIFEST_SUFFIX, Source, SourceOptions, filter_in_memory, parse_entry, validate_manifest_name,
};
use crate::entry::RepositoryEntry;
use crate::error::{ResourceError, Result};
use crate::filter::Filter;
use crate::git::{CommandExecutor, failure_message, run_git};

const DEFAULT_AUTHOR_NAME: &str = "metalink-resource";
const DEFAULT_AUTHOR_EMAIL: &str = "metalink-resource@localhost";

/// A parsed `git+` repository URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitUri {
    /// Transport URL handed to git.
    pub remote: String,
    /// Manifest directory within the repository; empty for the root.
    pub path: String,
    /// Branch named in the URI fragment.
    pub branch: Option<String>,
}

impl GitUri {
    /// Parse `git+<transport-url>[//<path>][#<branch>]`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] when the prefix or the
    /// transport URL is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use metalink_resource::source::GitUri;
    ///
    /// let uri = GitUri::parse("git+https://example.com/repo.git//releases#main")
    ///     .expect("valid uri");
    /// assert_eq!(uri.remote, "https://example.com/repo.git");
    /// assert_eq!(uri.path, "releases");
    /// assert_eq!(uri.branch.as_deref(), Some("main"));
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let without_prefix = raw
            .strip_prefix("git+")
            .ok_or_else(|| ResourceError::configuration(format!("not a git uri: {raw}")))?;
        let (location, branch) = match without_prefix.split_once('#') {
            Some((location, branch)) if !branch.is_empty() => (location, Some(branch.to_owned())),
            Some((location, _)) => (location, None),
            None => (without_prefix, None),
        };
        let authority_start = location.find("://").map_or(0, |index| index + 3);
        let (remote, path) = match location
            .get(authority_start..)
            .and_then(|rest| rest.find("//"))
        {
            Some(offset) => {
                let split = authority_start + offset;
                let (remote, path) = location.split_at(split);
                (remote, path.trim_start_matches('/').trim_end_matches('/'))
            }
            None => (location, ""),
        };
        if remote.is_empty() {
            return Err(ResourceError::configuration(format!(
                "git uri has no remote: {raw}"
            )));
        }
        Ok(Self {
            remote: remote.to_owned(),
            path: path.to_owned(),
            branch,
        })
    }
}

/// Manifests stored in a git repository.
pub struct GitSource<E: CommandExecutor> {
    raw_uri: String,
    uri: GitUri,
    branch: Option<String>,
    workdir: PathBuf,
    author_name: String,
    author_email: String,
    executor: E,
    entries: Option<Vec<RepositoryEntry>>,
}

impl<E: CommandExecutor> GitSource<E> {
    /// Create a source for `raw_uri`; nothing is cloned until
    /// [`Source::load`] or [`Source::put`].
    ///
    /// The `branch` option overrides a branch named in the URI fragment.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] for a malformed URI.
    pub fn new(raw_uri: &str, options: &SourceOptions, executor: E) -> Result<Self> {
        let uri = GitUri::parse(raw_uri)?;
        let cache_dir = options
            .cache_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let workdir = cache_dir.join(format!(
            "metalink-git-source-{}",
            HashAlgorithm::Md5.digest_bytes(raw_uri.as_bytes())
        ));
        Ok(Self {
            raw_uri: raw_uri.to_owned(),
            branch: options.branch.clone().or_else(|| uri.branch.clone()),
            uri,
            workdir,
            author_name: options
                .author_name
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_owned()),
            author_email: options
                .author_email
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_owned()),
            executor,
            entries: None,
        })
    }

    /// Location of the local working copy.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn manifest_dir(&self) -> PathBuf {
        if self.uri.path.is_empty() {
            self.workdir.clone()
        } else {
            self.workdir.join(&self.uri.path)
        }
    }

    fn relative_manifest_path(&self, name: &str) -> String {
        if self.uri.path.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", self.uri.path)
        }
    }

    fn lock(&self) -> Result<File> {
        let parent = self.workdir.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let mut lock_name = self.workdir.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock = File::create(PathBuf::from(lock_name))?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    fn sync(&self) -> Result<()> {
        if self.workdir.join(".git").exists() {
            return self.pull();
        }
        self.clone_repository()
    }

    fn clone_repository(&self) -> Result<()> {
        let workdir = self.workdir.to_string_lossy().into_owned();
        let mut args = vec!["clone", "--single-branch"];
        if let Some(branch) = self.branch.as_deref() {
            args.extend(["--branch", branch]);
        }
        args.extend([self.uri.remote.as_str(), workdir.as_str()]);
        log::info!("cloning {} into {workdir}", self.uri.remote);
        run_git(&self.executor, None, &args, "clone")?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        let mut args = vec!["pull", "--ff-only", "origin"];
        if let Some(branch) = self.branch.as_deref() {
            args.push(branch);
        }
        log::info!("refreshing {}", self.workdir.display());
        let output = self.executor.run("git", &args, Some(&self.workdir))?;
        if output.status.success() {
            return Ok(());
        }
        let message = failure_message(&output);
        if is_sync_conflict(&message) {
            return Err(ResourceError::SyncConflict { reason: message });
        }
        Err(ResourceError::Git {
            operation: "pull",
            message,
        })
    }

    fn enumerate(&self) -> Result<Vec<RepositoryEntry>> {
        let pattern = self.manifest_dir().join(format!("*{MANIFEST_SUFFIX}"));
        let paths = glob::glob(&pattern.to_string_lossy()).map_err(|err| {
            ResourceError::configuration(format!("repository path {}: {err}", self.uri.path))
        })?;

        let mut entries = Vec::new();
        for found in paths {
            let path = found.map_err(|err| ResourceError::Io(err.into_error()))?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relative = self.relative_manifest_path(&name);
            let revision = run_git(
                &self.executor,
                Some(&self.workdir),
                &["log", "--pretty=format:%H", "-n1", "--", &relative],
                "log",
            )?;
            let bytes = fs::read(&path)?;
            entries.push(parse_entry(&self.raw_uri, name, revision, &bytes)?);
        }
        Ok(entries)
    }

    fn commit_and_push(&self, relative: &str, name: &str) -> Result<()> {
        let workdir = Some(self.workdir.as_path());
        run_git(&self.executor, workdir, &["add", "--", relative], "add")?;
        let status = run_git(
            &self.executor,
            workdir,
            &["status", "--porcelain", "--", relative],
            "status",
        )?;
        if status.is_empty() {
            log::info!("manifest {name} is unchanged; nothing to commit");
            return Ok(());
        }

        let user_name = format!("user.name={}", self.author_name);
        let user_email = format!("user.email={}", self.author_email);
        let message = format!("Add {name}");
        run_git(
            &self.executor,
            workdir,
            &[
                "-c",
                &user_name,
                "-c",
                &user_email,
                "commit",
                "-m",
                &message,
                "--",
                relative,
            ],
            "commit",
        )?;

        let refspec = self
            .branch
            .as_deref()
            .map_or_else(|| "HEAD".to_owned(), |branch| format!("HEAD:{branch}"));
        let output = self
            .executor
            .run("git", &["push", "origin", &refspec], workdir)?;
        if output.status.success() {
            return Ok(());
        }
        let failure = failure_message(&output);
        if is_sync_conflict(&failure) {
            return Err(ResourceError::SyncConflict { reason: failure });
        }
        Err(ResourceError::Git {
            operation: "push",
            message: failure,
        })
    }
}

impl<E: CommandExecutor> Source for GitSource<E> {
    fn uri(&self) -> &str {
        &self.raw_uri
    }

    fn load(&mut self) -> Result<()> {
        let _lock = self.lock()?;
        self.sync()?;
        let entries = self.enumerate()?;
        log::debug!("loaded {} manifests from {}", entries.len(), self.raw_uri);
        self.entries = Some(entries);
        Ok(())
    }

    fn filter(&self, filter: &dyn Filter) -> Result<Vec<RepositoryEntry>> {
        filter_in_memory(self.entries.as_deref(), filter)
    }

    fn put(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        validate_manifest_name(name)?;
        let _lock = self.lock()?;
        self.sync()?;

        let dir = self.manifest_dir();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(name), contents)?;
        let relative = self.relative_manifest_path(name);
        self.commit_and_push(&relative, name)?;
        log::info!("stored manifest {name} in {}", self.raw_uri);
        Ok(())
    }
}

fn is_sync_conflict(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    ["fast-forward", "diverg", "rejected", "non-fast-forward", "fetch first"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
