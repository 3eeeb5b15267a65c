//! Hook process execution
//!
//! Each hook is `sh -c <command>` in the project directory with the JSON
//! payload on stdin. The runner never fails: spawn errors and timeouts come
//! back as results.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::HookCommand;
use super::types::{HookExecutionResult, HookJsonInput};

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable pointing hooks at the project root
pub const PROJECT_DIR_ENV: &str = "HOOKLINE_PROJECT_DIR";

#[derive(Debug, Clone)]
pub struct HookRunner {
    project_dir: PathBuf,
    env: HashMap<String, String>,
    default_timeout: Duration,
}

impl HookRunner {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            env: HashMap::new(),
            default_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    /// Extra variables layered over the inherited environment
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn project_dir(&self) -> &PathBuf {
        &self.project_dir
    }

    /// Run one hook to completion or timeout
    pub async fn run(&self, hook: &HookCommand, input: &HookJsonInput) -> HookExecutionResult {
        let payload = match serde_json::to_string(input) {
            Ok(s) => s,
            Err(e) => {
                // HookJsonInput only holds strings and JSON values
                warn!(command = %hook.command, "Failed to serialize hook input: {}", e);
                String::from("{}")
            }
        };
        let timeout = hook.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(&hook.command)
            .current_dir(&self.project_dir)
            .env(PROJECT_DIR_ENV, &self.project_dir)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                warn!(command = %hook.command, "Failed to spawn hook: {}", e);
                return HookExecutionResult::spawn_failed(&hook.command, &e);
            }
        };

        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                // Hooks are free to ignore stdin
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    debug!("Hook did not consume stdin: {}", e);
                }
                let _ = stdin.shutdown().await;
            }
        };
        let run = async move {
            let ((), output) = tokio::join!(write_input, child.wait_with_output());
            output
        };

        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(command = %hook.command, "Hook execution failed: {}", e);
                return HookExecutionResult::finished(
                    &hook.command,
                    None,
                    String::new(),
                    format!("hook execution failed: {}", e),
                    elapsed_ms(started),
                );
            }
            Err(_) => {
                warn!(command = %hook.command, timeout_ms = timeout.as_millis() as u64, "Hook timed out");
                return HookExecutionResult::timeout(&hook.command, elapsed_ms(started));
            }
        };

        let exit_code = output.status.code();
        let duration_ms = elapsed_ms(started);
        debug!(
            command = %hook.command,
            exit_code = exit_code.unwrap_or(-1),
            duration_ms,
            "Hook execution complete"
        );

        HookExecutionResult::finished(
            &hook.command,
            exit_code,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        )
    }

    /// `run`, raced against `cancel`
    ///
    /// Returns `None` when cancelled; the child is killed on drop.
    pub async fn run_cancellable(
        &self,
        hook: &HookCommand,
        input: &HookJsonInput,
        cancel: &CancellationToken,
    ) -> Option<HookExecutionResult> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.run(hook, input) => Some(result),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::types::{ExitClass, HookEvent};
    use tempfile::TempDir;

    fn input(dir: &TempDir) -> HookJsonInput {
        HookJsonInput {
            session_id: "test-session".into(),
            transcript_path: "/tmp/test-session.jsonl".into(),
            cwd: dir.path().display().to_string(),
            hook_event_name: HookEvent::PreToolUse,
            tool_name: Some("Write".into()),
            tool_input: Some(serde_json::json!({"file_path": "a.txt"})),
            tool_response: None,
            prompt: None,
        }
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let runner = HookRunner::new(dir.path());
        let result = runner
            .run(&HookCommand::new("echo out; echo err >&2; exit 2"), &input(&dir))
            .await;

        assert_eq!(result.exit_code(), Some(2));
        assert_eq!(result.stdout(), "out\n");
        assert_eq!(result.stderr(), "err\n");
        assert_eq!(result.exit_class(), ExitClass::Blocking);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn payload_arrives_on_stdin() {
        let dir = TempDir::new().unwrap();
        let runner = HookRunner::new(dir.path());
        let result = runner.run(&HookCommand::new("cat"), &input(&dir)).await;

        let echoed: HookJsonInput = serde_json::from_str(result.stdout()).unwrap();
        assert_eq!(echoed, input(&dir));
        assert!(result.success());
    }

    #[tokio::test]
    async fn ignoring_stdin_is_fine() {
        let dir = TempDir::new().unwrap();
        let runner = HookRunner::new(dir.path());
        let result = runner.run(&HookCommand::new("exit 0"), &input(&dir)).await;
        assert!(result.success());
    }

    #[tokio::test]
    async fn project_dir_and_env_are_injected() {
        let dir = TempDir::new().unwrap();
        let env = HashMap::from([("HOOK_FLAVOR".to_string(), "mint".to_string())]);
        let runner = HookRunner::new(dir.path()).with_env(env);
        let result = runner
            .run(
                &HookCommand::new("printf '%s %s' \"$HOOKLINE_PROJECT_DIR\" \"$HOOK_FLAVOR\""),
                &input(&dir),
            )
            .await;

        assert_eq!(result.stdout(), format!("{} mint", dir.path().display()));
    }

    #[tokio::test]
    async fn slow_hook_times_out() {
        let dir = TempDir::new().unwrap();
        let runner = HookRunner::new(dir.path());
        let hook = HookCommand::new("sleep 5").with_timeout(Duration::from_millis(200));
        let result = runner.run(&hook, &input(&dir)).await;

        assert!(result.timed_out());
        assert_eq!(result.exit_code(), None);
        assert!(!result.success());
        assert!(result.duration_ms() < 5000);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_result() {
        let dir = TempDir::new().unwrap();
        let runner = HookRunner::new(dir.path().join("missing"));
        let result = runner.run(&HookCommand::new("true"), &input(&dir)).await;

        assert_eq!(result.exit_code(), None);
        assert!(!result.success());
        assert!(result.stderr().contains("failed to spawn hook"));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let runner = HookRunner::new(dir.path());
        let hook = HookCommand::new(format!("sleep 0.5 && touch '{}'", marker.display()));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = runner.run_cancellable(&hook, &input(&dir), &cancel).await;
        assert!(result.is_none());

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!marker.exists());
    }
}
