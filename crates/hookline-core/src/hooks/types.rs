//! Hook event and result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle point a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    /// Runs before tool execution, can block
    PreToolUse,
    /// Runs after tool execution
    PostToolUse,
    /// Fires when the user submits a prompt, can block or add context
    UserPromptSubmit,
    /// Fires when the model stops calling tools, can force another round
    Stop,
}

impl HookEvent {
    pub fn all() -> &'static [HookEvent] {
        &[
            HookEvent::PreToolUse,
            HookEvent::PostToolUse,
            HookEvent::UserPromptSubmit,
            HookEvent::Stop,
        ]
    }

    /// Name used in settings files and the stdin payload
    pub fn display_name(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::Stop => "Stop",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "Before tool execution",
            HookEvent::PostToolUse => "After tool execution",
            HookEvent::UserPromptSubmit => "When the user submits a prompt",
            HookEvent::Stop => "When the agent is about to stop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PreToolUse" => Some(HookEvent::PreToolUse),
            "PostToolUse" => Some(HookEvent::PostToolUse),
            "UserPromptSubmit" => Some(HookEvent::UserPromptSubmit),
            "Stop" => Some(HookEvent::Stop),
            _ => None,
        }
    }

    /// Whether groups for this event are filtered by tool name
    pub fn uses_matcher(&self) -> bool {
        matches!(self, HookEvent::PreToolUse | HookEvent::PostToolUse)
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Document written to a hook's stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookJsonInput {
    pub session_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub hook_event_name: HookEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// How a finished hook is interpreted
///
/// - 0: success
/// - 2: blocking error, stderr is the message
/// - anything else (including timeout and spawn failure): non-blocking error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    Blocking,
    NonBlocking,
}

/// Outcome of one hook process; never mutated after the runner returns it
#[derive(Debug, Clone, PartialEq)]
pub struct HookExecutionResult {
    command: String,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    duration_ms: u64,
    timed_out: bool,
}

impl HookExecutionResult {
    pub(crate) fn finished(
        command: &str,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            command: command.to_string(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
            timed_out: false,
        }
    }

    pub(crate) fn timeout(command: &str, duration_ms: u64) -> Self {
        Self {
            command: command.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms,
            timed_out: true,
        }
    }

    pub(crate) fn spawn_failed(command: &str, error: &std::io::Error) -> Self {
        Self {
            command: command.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: format!("failed to spawn hook: {}", error),
            duration_ms: 0,
            timed_out: false,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// None when the process could not be spawned, was killed, or timed out
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    pub fn exit_class(&self) -> ExitClass {
        match (self.exit_code, self.timed_out) {
            (Some(0), false) => ExitClass::Success,
            (Some(2), false) => ExitClass::Blocking,
            _ => ExitClass::NonBlocking,
        }
    }

    /// Text for a user-visible error block describing a non-blocking failure
    pub fn failure_summary(&self) -> String {
        if self.timed_out {
            return format!("timed out after {}ms", self.duration_ms);
        }
        let stderr = self.stderr.trim();
        match (self.exit_code, stderr.is_empty()) {
            (Some(code), true) => format!("exited with code {}", code),
            (Some(code), false) => format!("exited with code {}: {}", code, stderr),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => stderr.to_string(),
        }
    }
}
