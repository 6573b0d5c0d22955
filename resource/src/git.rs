//! Git command execution for repository sources.
//!
//! Commands run through [`CommandExecutor`] so sources can be exercised with
//! stubbed output. The system executor enforces a timeout so a stalled
//! network operation cannot hang an invocation indefinitely.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::{ResourceError, Result};

/// Default timeout for git operations (5 minutes).
pub const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs `cmd` with `args`, optionally inside `working_dir`, and returns
    /// the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while spawning the command, or a
    /// [`ResourceError::Git`] when it times out.
    fn run(&self, cmd: &str, args: &[&str], working_dir: Option<&Path>) -> Result<Output>;
}

/// Executes commands on the host system with a timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// An executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(GIT_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str], working_dir: Option<&Path>) -> Result<Output> {
        let mut command = Command::new(cmd);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        // Both pipes are drained while waiting so chatty commands never
        // block on a full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        if let Some(status) = child.wait_timeout(self.timeout)? {
            return Ok(Output {
                status,
                stdout: collect(stdout)?,
                stderr: collect(stderr)?,
            });
        }

        if child.kill().is_err() {
            log::debug!("{cmd} exited before it could be killed");
        }
        child.wait()?;
        Err(ResourceError::Git {
            operation: "run",
            message: format!(
                "{cmd} {} timed out after {} seconds",
                args.join(" "),
                self.timeout.as_secs()
            ),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut reader) = pipe {
            reader.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn collect(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")))
}

/// Run `git` and return its trimmed standard output.
///
/// # Errors
///
/// Returns [`ResourceError::Git`] tagged with `operation` when git exits
/// unsuccessfully.
pub fn run_git(
    executor: &dyn CommandExecutor,
    working_dir: Option<&Path>,
    args: &[&str],
    operation: &'static str,
) -> Result<String> {
    log::debug!("git {}", args.join(" "));
    let output = executor.run("git", args, working_dir)?;
    if !output.status.success() {
        return Err(ResourceError::Git {
            operation,
            message: failure_message(&output),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

/// The trimmed standard error of a failed command, or its exit status.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.is_empty() {
        format!("exit status {}", output.status)
    } else {
        stderr
    }
}
