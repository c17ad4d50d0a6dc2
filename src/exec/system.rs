// ABOUTME: Real execution backend spawning OS processes via tokio.
// ABOUTME: Enforces timeouts and kills the child rather than abandoning it.

use super::{CommandRunner, ExecError, Invocation, SubprocessResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Spawns invocations as real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        // Merged on top of the inherited environment, never replacing it.
        cmd.envs(&invocation.env);
        cmd
    }

    fn spawn_error(invocation: &Invocation, source: std::io::Error) -> ExecError {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExecError::NotFound {
                program: invocation.program.clone(),
            }
        } else {
            ExecError::Spawn {
                program: invocation.program.clone(),
                source,
            }
        }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<SubprocessResult, ExecError> {
        debug!(command = %invocation, "running subprocess");
        let start = Instant::now();

        let child = Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future (timeout below) must terminate the
            // child; a long-running orphaned vendor process is a leak.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::spawn_error(invocation, e))?;

        let waited = tokio::time::timeout(invocation.timeout, child.wait_with_output()).await;

        let output = match waited {
            Ok(result) => result.map_err(|source| ExecError::Wait {
                program: invocation.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    program: invocation.program.clone(),
                    timeout: invocation.timeout,
                });
            }
        };

        let result = SubprocessResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };

        debug!(
            command = %invocation,
            exit_code = result.exit_code,
            elapsed_ms = result.duration.as_millis() as u64,
            "subprocess finished"
        );

        Ok(result)
    }

    async fn run_interactive(&self, invocation: &Invocation) -> Result<i32, ExecError> {
        debug!(command = %invocation, "running interactive subprocess");

        let status = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Self::spawn_error(invocation, e))?;

        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let runner = SystemRunner::new();
        let inv = Invocation::new("stratus-test-no-such-binary", Vec::<String>::new());

        let err = runner.run(&inv).await.unwrap_err();
        assert!(matches!(err, ExecError::NotFound { .. }));
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = SystemRunner::new();
        let inv = Invocation::new("sh", ["-c", "echo hello; exit 3"]);

        let result = runner.run(&inv).await.unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn env_is_merged_not_replaced() {
        let runner = SystemRunner::new();
        let inv = Invocation::new("sh", ["-c", "echo $STRATUS_EXEC_TEST:$PATH"])
            .env("STRATUS_EXEC_TEST", "yes");

        let result = runner.run(&inv).await.unwrap();
        let stdout = result.stdout.trim();
        assert!(stdout.starts_with("yes:"), "override applied: {stdout}");
        assert!(stdout.len() > 4, "inherited PATH survives: {stdout}");
    }

    #[tokio::test]
    async fn timeout_terminates_the_subprocess() {
        let runner = SystemRunner::new();
        let inv =
            Invocation::new("sh", ["-c", "sleep 30"]).timeout(Duration::from_millis(100));

        let err = runner.run(&inv).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }
}
