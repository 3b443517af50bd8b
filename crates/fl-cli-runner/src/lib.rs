//! Drives the FunLess command line (`fl`) as a child process.
//!
//! Output is read from the child's pipes and handed back as a [`CliOutput`]
//! or written into a caller-supplied sink; the test process's own stdout is
//! never redirected, so several commands may run concurrently.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Prefix the CLI puts in front of every error it reports.
pub const ERROR_PREFIX: &str = "fl: error";

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to write command output: {0}")]
    Sink(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CliOutput {
    fn failed(reason: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("{ERROR_PREFIX}: {reason}\n"),
            success: false,
        }
    }

    /// Everything the command printed: stdout, then stderr.
    pub fn transcript(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }

    pub fn last_line(&self) -> String {
        last_line(&self.transcript()).to_string()
    }

    pub fn is_error(&self) -> bool {
        !self.success || is_error_line(last_line(&self.transcript()))
    }
}

/// Last non-empty line of `text`, without its line terminator.
pub fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

pub fn is_error_line(line: &str) -> bool {
    line.starts_with(ERROR_PREFIX)
}

/// How to launch the `fl` binary.
#[derive(Debug, Clone)]
pub struct FlCli {
    program: PathBuf,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl FlCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
            env: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    /// `FL_CLI_BIN`, or `fl` from `PATH`.
    pub fn from_env() -> Self {
        let program = std::env::var("FL_CLI_BIN").unwrap_or_else(|_| "fl".to_string());
        Self::new(program)
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `fl <args>` to completion. Launch failures and timeouts are
    /// reported in the transcript with the CLI's own error prefix.
    #[instrument(skip(self), fields(program = %self.program.display()))]
    pub async fn run(&self, args: &[&str]) -> CliOutput {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to launch CLI");
                return CliOutput::failed(format!(
                    "failed to launch {}: {e}",
                    self.program.display()
                ));
            }
        };

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CliOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    success: output.status.success(),
                };
                debug!(success = result.success, last_line = %result.last_line(), "CLI finished");
                result
            }
            Ok(Err(e)) => CliOutput::failed(format!("failed to collect output: {e}")),
            Err(_) => CliOutput::failed(format!("command timed out after {:?}", self.timeout)),
        }
    }

    /// Runs `fl <args>` and writes its transcript into `sink`.
    pub async fn run_into<W: Write>(&self, args: &[&str], sink: &mut W) -> Result<CliOutput> {
        let output = self.run(args).await;
        sink.write_all(output.transcript().as_bytes())?;
        sink.flush()?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("Module: m\nFunctions:\nf\n"), "f");
        assert_eq!(last_line("ok\nfl: error: Not Found"), "fl: error: Not Found");
        assert_eq!(last_line("\n\n"), "");
        assert_eq!(last_line(""), "");
    }

    #[test]
    fn test_error_detection() {
        let output = CliOutput {
            stdout: String::new(),
            stderr: "fl: error: Not Found\n".to_string(),
            success: false,
        };
        assert!(output.is_error());
        assert_eq!(output.last_line(), "fl: error: Not Found");

        let output = CliOutput {
            stdout: "Successfully created module test_mod.\n".to_string(),
            stderr: String::new(),
            success: true,
        };
        assert!(!output.is_error());
    }
}
