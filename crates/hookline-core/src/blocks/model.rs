//! Message and block types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolResult;

/// Store-assigned message identifier, unique per session
pub type MessageId = u64;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub blocks: Vec<Block>,
}

impl Message {
    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool blocks in this message, in insertion order
    pub fn tool_blocks(&self) -> impl Iterator<Item = &ToolBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Tool(tool) => Some(tool),
            _ => None,
        })
    }

    /// Whether the message only carries user-visible error blocks
    pub fn is_error_only(&self) -> bool {
        !self.blocks.is_empty() && self.blocks.iter().all(|b| matches!(b, Block::Error { .. }))
    }
}

/// One rendered unit of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        text: String,
    },
    Tool(ToolBlock),
    /// Unified diff produced by a mutating tool
    Diff {
        tool_use_id: String,
        diff: String,
    },
    /// Shown to the user only, never sent to the model
    Error {
        message: String,
    },
    /// Summary that replaces all earlier history when talking to the model
    Compress {
        summary: String,
    },
    /// Project notes loaded at session start
    Memory {
        source: String,
        content: String,
    },
}

/// State of a single tool call
///
/// `id` is the model's tool-call id. `BlockStore` guarantees exactly one
/// block per id for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBlock {
    pub id: String,
    pub name: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Error code when the call failed (e.g. `permission_denied`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_result: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ToolBlock {
    /// A freshly requested call with no result yet
    pub fn pending(id: impl Into<String>, name: impl Into<String>, parameters: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
            result: None,
            success: None,
            error: None,
            is_running: true,
            short_result: None,
            images: Vec::new(),
        }
    }

    /// Parameters as the JSON text the model sent
    pub fn parameters_json(&self) -> String {
        self.parameters.to_string()
    }

    /// Record a finished tool result
    pub fn complete(&mut self, result: &ToolResult) {
        self.result = Some(result.output.clone());
        self.success = Some(!result.is_error);
        self.error = result.error_code().map(ToString::to_string);
        self.short_result = result.short_result.clone();
        self.is_running = false;
    }

    /// Record a failure that happened before the tool ran
    pub fn fail(&mut self, code: &str, message: impl Into<String>) {
        self.result = Some(message.into());
        self.success = Some(false);
        self.error = Some(code.to_string());
        self.is_running = false;
    }

    /// Whether a result (success or failure) has been recorded
    pub fn is_finished(&self) -> bool {
        self.success.is_some()
    }
}
