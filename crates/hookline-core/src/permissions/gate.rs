//! Permission gate: bypass, host callback, or human confirmation

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::queue::{ConfirmationQueue, ABORTED_BY_USER};
use super::{PermissionCallback, PermissionDecision, PermissionMode, DEFAULT_CALLBACK_TIMEOUT};

/// One restricted tool call asking to run
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub tool_name: String,
    pub tool_use_id: String,
    pub arguments: Value,
    pub preview: Option<String>,
}

pub struct PermissionGate {
    mode: PermissionMode,
    callback: Option<Arc<dyn PermissionCallback>>,
    queue: Arc<ConfirmationQueue>,
    callback_timeout: Duration,
}

impl PermissionGate {
    pub fn new(mode: PermissionMode) -> Self {
        Self {
            mode,
            callback: None,
            queue: Arc::new(ConfirmationQueue::new()),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    /// Ask `callback` instead of queueing for a human
    pub fn with_callback(mut self, callback: Arc<dyn PermissionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Queue a consumer drains to present confirmations
    pub fn queue(&self) -> &Arc<ConfirmationQueue> {
        &self.queue
    }

    /// Decide whether a restricted tool may run
    ///
    /// Returns `None` when `cancel` fires first; a queued request is then
    /// withdrawn and never presented, and a presented one stops being active.
    pub async fn check_permission(
        &self,
        request: PermissionRequest,
        cancel: &CancellationToken,
    ) -> Option<PermissionDecision> {
        if self.mode == PermissionMode::Bypass {
            return Some(PermissionDecision::allow());
        }

        if let Some(callback) = &self.callback {
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                decision = self.ask_callback(callback.as_ref(), &request.tool_name) => Some(decision),
            };
        }

        let (id, rx) = self.queue.enqueue(
            &request.tool_name,
            &request.tool_use_id,
            request.arguments,
            request.preview,
        );
        info!(tool = %request.tool_name, tool_use_id = %request.tool_use_id, "Awaiting confirmation");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Already presented: free the slot so the next request can show
                if !self.queue.withdraw(id) {
                    self.queue.finish(id);
                }
                None
            }
            result = rx => Some(result.unwrap_or_else(|_| PermissionDecision::deny(ABORTED_BY_USER))),
        }
    }

    /// Fail-closed: errors, panics and timeouts all deny
    async fn ask_callback(&self, callback: &dyn PermissionCallback, tool_name: &str) -> PermissionDecision {
        let call = AssertUnwindSafe(callback.can_use_tool(tool_name)).catch_unwind();
        match tokio::time::timeout(self.callback_timeout, call).await {
            Ok(Ok(Ok(decision))) => decision,
            Ok(Ok(Err(e))) => {
                warn!(tool = tool_name, "Permission callback failed: {:#}", e);
                PermissionDecision::deny(format!("Permission check failed: {}", e))
            }
            Ok(Err(_)) => {
                warn!(tool = tool_name, "Permission callback panicked");
                PermissionDecision::deny("Permission check failed unexpectedly")
            }
            Err(_) => {
                warn!(
                    tool = tool_name,
                    timeout_secs = self.callback_timeout.as_secs(),
                    "Permission callback timed out"
                );
                PermissionDecision::deny("Permission check timed out")
            }
        }
    }
}
