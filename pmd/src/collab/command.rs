//! Running external commands with a deadline

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use super::CollabError;

/// Captured result of one command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout of a zero exit, otherwise a `Failed` error
    pub fn into_stdout(self, program: &str) -> Result<String, CollabError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(CollabError::Failed {
                program: program.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Run `program args...` in `cwd`, killing it after `timeout`
pub async fn run_command<S: AsRef<str>>(
    program: &str,
    args: &[S],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, CollabError> {
    debug!(%program, arg_count = args.len(), ?cwd, timeout_ms = timeout.as_millis() as u64, "run_command: called");
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|a| a.as_ref())).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(%program, exit_code, duration_ms, "run_command: completed");
            Ok(CommandOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                duration_ms,
            })
        }
        Ok(Err(source)) => {
            debug!(%program, error = %source, "run_command: spawn failed");
            Err(CollabError::Spawn {
                program: program.to_string(),
                source,
            })
        }
        Err(_) => {
            debug!(%program, "run_command: timed out");
            Err(CollabError::Timeout {
                program: program.to_string(),
                timeout,
            })
        }
    }
}

/// Run a shell command line through `sh -c`
pub async fn run_shell(command: &str, cwd: Option<&Path>, timeout: Duration) -> Result<CommandOutput, CollabError> {
    debug!(%command, "run_shell: called");
    run_command("sh", &["-c", command], cwd, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_command_success() {
        let out = run_command("echo", &["hello", "world"], None, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello world");
    }

    #[tokio::test]
    async fn test_run_shell_failure_maps_to_failed() {
        let temp = tempdir().unwrap();
        let out = run_shell("echo oops >&2; exit 3", Some(temp.path()), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        match out.into_stdout("sh") {
            Err(CollabError::Failed { exit_code, stderr, .. }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let result = run_shell("sleep 10", None, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(CollabError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_run_command_missing_program() {
        let result = run_command("definitely-not-a-real-program-xyz", &["x"], None, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(CollabError::Spawn { .. })));
    }
}
