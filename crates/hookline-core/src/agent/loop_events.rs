//! Event protocol between the agent loop and presentation layers.
//!
//! Block-level changes travel over `BlockStore::subscribe`; `LoopEvent`
//! carries loop-level state a renderer cannot derive from blocks alone.

use serde::Serialize;

use crate::hooks::HookEvent;

/// Where a turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "pending", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    AwaitingModel,
    /// Number of tool calls in the current batch
    ExecutingTools(usize),
}

/// Events emitted by the agent loop.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    // ── Loop state ─────────────────────────────────────────────────────
    StateChanged { state: LoopState },

    /// Conversation history was summarized before a model call.
    Compressed { estimated_tokens: usize },

    // ── Tool lifecycle ─────────────────────────────────────────────────
    /// Tool passed PreToolUse hooks and is being invoked (may still wait
    /// on the permission gate).
    ToolExecuting { id: String, name: String },

    /// Tool finished with a result.
    ToolResult {
        id: String,
        output: String,
        is_error: bool,
    },

    // ── Hooks ──────────────────────────────────────────────────────────
    /// A hook exited with the blocking code.
    HookBlocked { event: HookEvent, message: String },

    // ── Turn lifecycle ─────────────────────────────────────────────────
    /// One model call and its tool batch completed.
    TurnComplete { turn: usize, has_more: bool },

    /// The turn ended.
    Finished { session_id: String },

    /// Model backend error.
    Error { error: String },
}
