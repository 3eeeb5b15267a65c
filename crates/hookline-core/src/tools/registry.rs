//! Tool table, result envelope and the tool contract
//!
//! Every tool goes through the same three steps: `prepare` validates and
//! computes what would happen, `preview` describes it for a human, `apply`
//! does it. Nothing with a side effect may run before `apply`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::ai::types::AiTool;

/// Default tool execution timeout (2 minutes)
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Closed set of built-in tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Read,
    List,
    Write,
    Edit,
    MultiEdit,
    Delete,
    Bash,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Read,
            ToolKind::List,
            ToolKind::Write,
            ToolKind::Edit,
            ToolKind::MultiEdit,
            ToolKind::Delete,
            ToolKind::Bash,
        ]
    }

    /// Name the model uses to call the tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Read => "Read",
            ToolKind::List => "List",
            ToolKind::Write => "Write",
            ToolKind::Edit => "Edit",
            ToolKind::MultiEdit => "MultiEdit",
            ToolKind::Delete => "Delete",
            ToolKind::Bash => "Bash",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.name() == name)
    }

    /// Tools that mutate the filesystem or run commands need permission
    pub fn is_restricted(&self) -> bool {
        match self {
            ToolKind::Read | ToolKind::List => false,
            ToolKind::Write | ToolKind::Edit | ToolKind::MultiEdit | ToolKind::Delete | ToolKind::Bash => true,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
    /// Structured error code for failed results
    pub code: Option<String>,
    /// One-line summary for compact rendering
    pub short_result: Option<String>,
    /// Unified diff of a file change
    pub diff: Option<String>,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
            code: None,
            short_result: None,
            diff: None,
        }
    }

    /// Create a structured success envelope with `ok=true` and `data`.
    pub fn success_data(data: Value) -> Self {
        Self::success_data_with(data, Vec::new(), None, None)
    }

    /// Create a structured success envelope with optional warnings/diff/metadata.
    pub fn success_data_with(
        data: Value,
        warnings: Vec<String>,
        diff: Option<String>,
        metadata: Option<Value>,
    ) -> Self {
        let diff = diff.filter(|d| !d.is_empty());
        let mut envelope = serde_json::Map::new();
        envelope.insert("ok".to_string(), Value::Bool(true));
        envelope.insert("data".to_string(), data);

        if !warnings.is_empty() {
            envelope.insert(
                "warnings".to_string(),
                Value::Array(warnings.into_iter().map(Value::String).collect()),
            );
        }

        if let Some(diff) = &diff {
            envelope.insert("diff".to_string(), Value::String(diff.clone()));
        }

        if let Some(metadata) = metadata {
            envelope.insert("metadata".to_string(), metadata);
        }

        Self {
            output: Value::Object(envelope).to_string(),
            is_error: false,
            code: None,
            short_result: None,
            diff,
        }
    }

    /// Create a structured error with explicit code.
    pub fn error_with_code(code: &str, msg: impl std::fmt::Display) -> Self {
        Self::error_with_details(code, msg, None, None)
    }

    /// Create a structured error envelope with optional data/metadata.
    pub fn error_with_details(
        code: &str,
        msg: impl std::fmt::Display,
        data: Option<Value>,
        metadata: Option<Value>,
    ) -> Self {
        let mut envelope = serde_json::Map::new();
        envelope.insert("ok".to_string(), Value::Bool(false));
        envelope.insert(
            "error".to_string(),
            serde_json::json!({
                "code": code,
                "message": msg.to_string()
            }),
        );

        if let Some(data) = data {
            envelope.insert("data".to_string(), data);
        }

        if let Some(metadata) = metadata {
            envelope.insert("metadata".to_string(), metadata);
        }

        Self {
            output: Value::Object(envelope).to_string(),
            is_error: true,
            code: Some(code.to_string()),
            short_result: None,
            diff: None,
        }
    }

    /// Create an invalid-parameters error.
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("invalid_parameters", msg)
    }

    /// Refusal from the permission gate; the message is what the model sees
    pub fn permission_denied(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("permission_denied", msg)
    }

    /// Create an error result with JSON-formatted error message
    pub fn error(msg: impl std::fmt::Display) -> Self {
        let message = msg.to_string();
        let code = classify_error_code(&message);
        Self::error_with_details(code, message, None, None)
    }

    pub fn with_short_result(mut self, short: impl Into<String>) -> Self {
        self.short_result = Some(short.into());
        self
    }

    pub fn error_code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Human-readable message of a failed result
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error {
            return None;
        }
        let parsed: Value = serde_json::from_str(&self.output).ok()?;
        parsed["error"]["message"].as_str().map(ToString::to_string)
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::invalid_parameters(format!("Invalid parameters: {}", e)))
}

fn classify_error_code(message: &str) -> &'static str {
    let lower = message.to_ascii_lowercase();
    if lower.contains("invalid parameters")
        || lower.contains("missing field")
        || lower.contains("unknown field")
    {
        "invalid_parameters"
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "timeout"
    } else if lower.contains("denied") {
        "permission_denied"
    } else if lower.contains("unknown tool") {
        "unknown_tool"
    } else {
        "tool_error"
    }
}

/// Context for tool execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    /// Optional per-call timeout override
    pub timeout: Option<Duration>,
    pub tool_use_id: Option<String>,
}

impl ToolContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: None,
            tool_use_id: None,
        }
    }

    pub fn with_tool_use_id(mut self, id: impl Into<String>) -> Self {
        self.tool_use_id = Some(id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a path relative to working directory (absolute paths pass through)
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.working_dir.join(p)
        }
    }
}

/// What a prepared call is about to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preview {
    pub summary: String,
    pub diff: Option<String>,
}

impl Preview {
    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            diff: None,
        }
    }

    pub fn with_diff(mut self, diff: String) -> Self {
        if !diff.is_empty() {
            self.diff = Some(diff);
        }
        self
    }

    /// Text shown on a confirmation prompt
    pub fn display(&self) -> String {
        match &self.diff {
            Some(diff) => format!("{}\n{}", self.summary, diff),
            None => self.summary.clone(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Validated, side-effect-free description of the call
    type Plan: Send + Sync;

    fn kind(&self) -> ToolKind;

    fn description(&self) -> &'static str;

    fn parameters_schema(&self) -> Value;

    /// Validate parameters and compute the change; must not touch anything
    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<Self::Plan, ToolResult>;

    fn preview(&self, plan: &Self::Plan) -> Preview;

    /// Longer limit than the default, if the call asked for one
    fn timeout(&self, _plan: &Self::Plan) -> Option<Duration> {
        None
    }

    /// Perform the effect
    async fn apply(&self, plan: Self::Plan, ctx: &ToolContext) -> ToolResult;

    fn definition(&self) -> AiTool {
        AiTool {
            name: self.kind().name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}
