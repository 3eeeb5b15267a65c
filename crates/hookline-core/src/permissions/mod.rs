//! Permission gate for restricted tools
//!
//! Restricted tools (anything that writes files or runs commands) must pass
//! the gate between preview and effect. The gate either allows outright
//! (bypass mode), asks a host callback, or parks the request in a serial
//! confirmation queue for a human.

mod gate;
mod queue;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gate::{PermissionGate, PermissionRequest};
pub use queue::{ConfirmationQueue, ConfirmationRequest, PendingConfirmation, ABORTED_BY_USER};

/// Host callbacks get five minutes before the request is denied
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Permission mode for tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    /// Restricted tools need a callback or human decision
    #[default]
    Default,
    /// Everything is allowed without asking
    Bypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBehavior {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub behavior: PermissionBehavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PermissionDecision {
    pub fn allow() -> Self {
        Self {
            behavior: PermissionBehavior::Allow,
            message: None,
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            behavior: PermissionBehavior::Deny,
            message: Some(message.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.behavior == PermissionBehavior::Allow
    }

    /// Text shown to the model when the tool was refused
    pub fn denial_message(&self) -> &str {
        self.message.as_deref().unwrap_or("Tool execution denied by user")
    }
}

/// Host-supplied decision maker, used instead of the confirmation queue
#[async_trait]
pub trait PermissionCallback: Send + Sync {
    async fn can_use_tool(&self, tool_name: &str) -> anyhow::Result<PermissionDecision>;
}
