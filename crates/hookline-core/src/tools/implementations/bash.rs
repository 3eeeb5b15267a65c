//! Bash tool - Execute shell commands

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio::time::timeout;

use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::truncation;
use crate::tools::{parse_params, ToolContext, ToolResult, DEFAULT_TOOL_TIMEOUT};

const MAX_OUTPUT_LINES: usize = 2000;
const MAX_OUTPUT_BYTES: usize = 50_000; // 50KB
const MAX_TIMEOUT_MS: u64 = 600_000;

pub struct BashTool;

#[derive(Deserialize)]
struct Params {
    command: String,
    /// Milliseconds
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    description: Option<String>,
}

pub struct BashPlan {
    command: String,
    timeout: Duration,
    description: Option<String>,
}

/// Strip ANSI escape sequences from text
fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]|\x1b\][^\x07]*\x07|\x1b\[[\?0-9;]*[a-zA-Z]").ok()
    });
    match re {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

fn build_shell_command(command: &str, ctx: &ToolContext) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.env("NO_COLOR", "1");
    cmd.current_dir(&ctx.working_dir);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut combined = stdout.trim_end().to_string();
    if !stderr.trim().is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr.trim_end());
    }
    let stripped = strip_ansi(&combined);
    let result = truncation::truncate_tail(&stripped, MAX_OUTPUT_LINES, MAX_OUTPUT_BYTES);
    match result.notice() {
        Some(notice) => format!("{}{}", result.text, notice),
        None => result.text,
    }
}

#[async_trait]
impl Tool for BashTool {
    type Plan = BashPlan;

    fn kind(&self) -> ToolKind {
        ToolKind::Bash
    }

    fn description(&self) -> &'static str {
        "Run a shell command with `sh -c` in the working directory. stdout and stderr are combined; the exit code is reported."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "Optional timeout in milliseconds (max 600000)"
                },
                "description": {
                    "type": "string",
                    "description": "Short description of what the command does"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, _ctx: &ToolContext) -> Result<BashPlan, ToolResult> {
        let params = parse_params::<Params>(params)?;
        if params.command.trim().is_empty() {
            return Err(ToolResult::invalid_parameters("command must not be empty"));
        }
        let timeout = match params.timeout {
            Some(0) => return Err(ToolResult::invalid_parameters("timeout must be positive")),
            Some(ms) => Duration::from_millis(ms.min(MAX_TIMEOUT_MS)),
            None => DEFAULT_TOOL_TIMEOUT,
        };
        Ok(BashPlan {
            command: params.command,
            timeout,
            description: params.description,
        })
    }

    fn preview(&self, plan: &BashPlan) -> Preview {
        match &plan.description {
            Some(description) => Preview::summary(format!("$ {}\n# {}", plan.command, description)),
            None => Preview::summary(format!("$ {}", plan.command)),
        }
    }

    fn timeout(&self, plan: &BashPlan) -> Option<Duration> {
        Some(plan.timeout)
    }

    async fn apply(&self, plan: BashPlan, ctx: &ToolContext) -> ToolResult {
        let child = match build_shell_command(&plan.command, ctx).spawn() {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to spawn command: {}", e)),
        };

        // Dropping the future on timeout or abort kills the child
        let output = match timeout(plan.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::error(format!("Command failed: {}", e)),
            Err(_) => {
                return ToolResult::error_with_code(
                    "timeout",
                    format!("Command timed out after {}ms", plan.timeout.as_millis()),
                )
            }
        };

        let processed = combine_output(&output.stdout, &output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        let metadata = Some(json!({ "exit_code": exit_code }));

        if exit_code == 0 {
            ToolResult::success_data_with(json!({ "output": processed }), Vec::new(), None, metadata)
                .with_short_result("exit 0")
        } else {
            ToolResult::error_with_details(
                "command_failed",
                format!("Command exited with code {}", exit_code),
                Some(json!({ "output": processed })),
                metadata,
            )
            .with_short_result(format!("exit {}", exit_code))
        }
    }
}
