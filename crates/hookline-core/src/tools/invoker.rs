//! Tool invocation: validate → preview → permission → apply
//!
//! Validation failures return before the permission gate is consulted, and
//! nothing with a side effect runs until the gate has allowed the call.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::implementations::{
    BashTool, DeleteTool, EditTool, ListTool, MultiEditTool, ReadTool, WriteTool,
};
use super::registry::{Tool, ToolContext, ToolKind, ToolResult, DEFAULT_TOOL_TIMEOUT};
use super::truncation::truncate_envelope;
use crate::ai::types::AiToolCall;
use crate::permissions::{PermissionGate, PermissionRequest};

/// Extra time for tools that enforce their own timeout to report it
const SELF_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Completed(ToolResult),
    /// The tool signal fired; no result exists
    Aborted,
}

pub struct ToolInvoker {
    gate: Arc<PermissionGate>,
    default_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(gate: Arc<PermissionGate>) -> Self {
        Self {
            gate,
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn gate(&self) -> &Arc<PermissionGate> {
        &self.gate
    }

    pub async fn invoke(
        &self,
        call: &AiToolCall,
        ctx: &ToolContext,
        cancel: &CancellationToken,
    ) -> InvokeOutcome {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            return InvokeOutcome::Completed(ToolResult::error_with_code(
                "unknown_tool",
                format!("Unknown tool: {}", call.name),
            ));
        };

        match kind {
            ToolKind::Read => self.run(&ReadTool, call, ctx, cancel).await,
            ToolKind::List => self.run(&ListTool, call, ctx, cancel).await,
            ToolKind::Write => self.run(&WriteTool, call, ctx, cancel).await,
            ToolKind::Edit => self.run(&EditTool, call, ctx, cancel).await,
            ToolKind::MultiEdit => self.run(&MultiEditTool, call, ctx, cancel).await,
            ToolKind::Delete => self.run(&DeleteTool, call, ctx, cancel).await,
            ToolKind::Bash => self.run(&BashTool, call, ctx, cancel).await,
        }
    }

    async fn run<T: Tool>(
        &self,
        tool: &T,
        call: &AiToolCall,
        ctx: &ToolContext,
        cancel: &CancellationToken,
    ) -> InvokeOutcome {
        let kind = tool.kind();

        let plan = match tool.prepare(call.arguments.clone(), ctx).await {
            Ok(plan) => plan,
            Err(result) => {
                debug!(tool = %kind, tool_use_id = %call.id, "Tool validation failed");
                return InvokeOutcome::Completed(result);
            }
        };
        let preview = tool.preview(&plan);

        if kind.is_restricted() {
            let request = PermissionRequest {
                tool_name: kind.name().to_string(),
                tool_use_id: call.id.clone(),
                arguments: call.arguments.clone(),
                preview: Some(preview.display()),
            };
            match self.gate.check_permission(request, cancel).await {
                None => return InvokeOutcome::Aborted,
                Some(decision) if !decision.is_allowed() => {
                    info!(tool = %kind, tool_use_id = %call.id, "Tool denied: {}", decision.denial_message());
                    return InvokeOutcome::Completed(
                        ToolResult::permission_denied(decision.denial_message())
                            .with_short_result("denied"),
                    );
                }
                Some(_) => {}
            }
        }

        let limit = match tool.timeout(&plan) {
            Some(own) => own + SELF_TIMEOUT_GRACE,
            None => ctx.timeout.unwrap_or(self.default_timeout),
        };

        let applied = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(tool = %kind, tool_use_id = %call.id, "Tool aborted");
                return InvokeOutcome::Aborted;
            }
            applied = tokio::time::timeout(limit, tool.apply(plan, ctx)) => applied,
        };

        let mut result = match applied {
            Ok(result) => result,
            Err(_) => ToolResult::error_with_code(
                "timeout",
                format!("Tool '{}' timed out after {}s", kind, limit.as_secs()),
            ),
        };
        if !result.is_error && result.diff.is_none() {
            result.diff = preview.diff;
        }
        result.output = truncate_envelope(&result.output);
        InvokeOutcome::Completed(result)
    }
}
