//! Scripted git executor for exercising git-backed sources without a
//! repository.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Output};

use crate::error::{ResourceError, Result};
use crate::git::CommandExecutor;

#[cfg(unix)]
fn status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// One scripted `git` invocation and the reply it receives.
#[derive(Debug)]
pub struct GitStep {
    args: Vec<String>,
    reply: Output,
}

impl GitStep {
    /// `git <args>` exits 0 with empty output.
    #[must_use]
    pub fn ok(args: &[&str]) -> Self {
        Self::ok_with(args, "")
    }

    /// `git <args>` exits 0 and prints `stdout`.
    #[must_use]
    pub fn ok_with(args: &[&str], stdout: &str) -> Self {
        Self::reply(args, 0, stdout, "")
    }

    /// `git <args>` exits 1 and prints `stderr`.
    #[must_use]
    pub fn fails(args: &[&str], stderr: &str) -> Self {
        Self::reply(args, 1, "", stderr)
    }

    fn reply(args: &[&str], code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            reply: Output {
                status: status(code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            },
        }
    }
}

/// A [`CommandExecutor`] that replays [`GitStep`]s in order.
///
/// Any invocation that is not the next scripted `git` call yields
/// [`ResourceError::StubMismatch`].
#[derive(Debug)]
pub struct ScriptedGit {
    steps: RefCell<VecDeque<GitStep>>,
}

impl ScriptedGit {
    /// Script the given steps.
    #[must_use]
    pub fn new(steps: Vec<GitStep>) -> Self {
        Self {
            steps: RefCell::new(steps.into()),
        }
    }

    /// Assert every scripted step ran.
    ///
    /// # Panics
    ///
    /// Panics when steps remain.
    pub fn assert_finished(&self) {
        let remaining = self.steps.borrow();
        assert!(
            remaining.is_empty(),
            "{} scripted git call(s) never ran, next: git {}",
            remaining.len(),
            remaining.front().map(|step| step.args.join(" ")).unwrap_or_default()
        );
    }
}

impl CommandExecutor for ScriptedGit {
    fn run(&self, cmd: &str, args: &[&str], _working_dir: Option<&Path>) -> Result<Output> {
        let invocation = format!("{cmd} {}", args.join(" "));
        let step = self
            .steps
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ResourceError::StubMismatch {
                message: format!("unscripted invocation: {invocation}"),
            })?;
        if cmd != "git" || step.args != args {
            return Err(ResourceError::StubMismatch {
                message: format!("expected git {}, got {invocation}", step.args.join(" ")),
            });
        }
        Ok(step.reply)
    }
}
