//! External process execution for crawler command lines.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Runs one command line to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command_line: &str) -> Result<(), ProcessError>;
}

/// Runs command lines through the platform shell.
///
/// No timeout is applied; a crawl that never exits holds its run forever.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    fn shell_command(command_line: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command_line]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command_line]);
            c
        };
        // Crawlers must never block on a prompt.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command_line: &str) -> Result<(), ProcessError> {
        debug!("Running: {}", command_line);

        let output = Self::shell_command(command_line)
            .output()
            .await
            .map_err(|source| ProcessError::Launch {
                command: command_line.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ProcessError::Failed {
                command: command_line.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// Whether the configured crawler binary can be found.
pub fn binary_available(binary: &str) -> bool {
    let binary = binary.trim_matches('"');
    which::which(binary).is_ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        let runner = ShellRunner::new();
        runner.run("true").await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let runner = ShellRunner::new();
        let err = runner.run("echo boom >&2; exit 3").await.unwrap_err();
        match err {
            ProcessError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let runner = ShellRunner::new();
        let err = runner
            .run("definitely-not-a-crawler-binary-xyz --version")
            .await
            .unwrap_err();
        // The shell launches fine and reports 127 for an unknown command.
        assert!(matches!(err, ProcessError::Failed { code: Some(127), .. }));
    }

    #[test]
    fn test_binary_available() {
        assert!(binary_available("sh"));
        assert!(!binary_available("definitely-not-a-crawler-binary-xyz"));
    }
}
