//! Subprocess boundary for the synthesis engine and the audio processor.
//!
//! Orchestration code never spawns processes directly. It builds an
//! [`Invocation`] and hands it to a [`CommandRunner`], which returns the exit
//! status together with captured output. Swapping the runner swaps the
//! engine integration (an in-process library, a remote worker, a test double)
//! without touching the pipeline.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default upper bound on a single subprocess call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised before a process produced an exit status.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The program could not be started (not installed, not executable, ...).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program did not exit within the configured timeout.
    #[error("{program} timed out after {} seconds", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    /// Waiting on the process or reading its output failed.
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A program plus its ordered argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as lossy UTF-8, for logs and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Short program name used in error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// The most useful captured stream for an error report: stderr, or
    /// stdout when stderr is empty.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs a program to completion and reports how it exited.
///
/// A non-zero exit is not an error at this layer; callers decide what a
/// failure means for their stage.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError>;
}

/// [`CommandRunner`] backed by `tokio::process`, with a per-call timeout.
#[derive(Debug, Clone)]
pub struct TokioRunner {
    timeout: Duration,
}

impl TokioRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        let program = invocation.program_name();
        tracing::debug!(command = %invocation, "running subprocess");

        let child = Command::new(invocation.program())
            .args(invocation.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout {
                program: program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ExecError::Wait {
                program: program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_preserves_argument_order() {
        let inv = Invocation::new("/usr/bin/piper")
            .arg("-m")
            .arg("model.onnx")
            .args(["--", "Hello there"]);
        assert_eq!(inv.args_lossy(), vec!["-m", "model.onnx", "--", "Hello there"]);
        assert_eq!(inv.program_name(), "piper");
        assert_eq!(
            inv.to_string(),
            "/usr/bin/piper -m model.onnx -- \"Hello there\""
        );
    }

    #[test]
    fn diagnostics_prefer_stderr() {
        let out = CommandOutput {
            code: Some(1),
            stdout: "stdout text".into(),
            stderr: "  boom \n".into(),
        };
        assert_eq!(out.diagnostics(), "boom");

        let out = CommandOutput {
            code: Some(1),
            stdout: "only stdout".into(),
            stderr: String::new(),
        };
        assert_eq!(out.diagnostics(), "only stdout");
        assert!(!out.is_success());
        assert!(CommandOutput::success().is_success());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let runner = TokioRunner::default();
        let inv = Invocation::new("/definitely/not/a/real/program-xyz");
        match runner.run(&inv).await {
            Err(ExecError::Spawn { program, .. }) => assert_eq!(program, "program-xyz"),
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_code_and_stderr() {
        let runner = TokioRunner::default();
        let inv = Invocation::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let out = runner.run(&inv).await.expect("sh should run");
        assert_eq!(out.code, Some(3));
        assert_eq!(out.diagnostics(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let runner = TokioRunner::new(Duration::from_millis(100));
        let inv = Invocation::new("sleep").arg("5");
        let result = runner.run(&inv).await;
        assert!(matches!(result, Err(ExecError::Timeout { .. })), "got {result:?}");
    }
}
