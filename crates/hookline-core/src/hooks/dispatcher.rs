//! Hook dispatch: run every matching hook for an event and apply the results
//!
//! Hooks for one event run concurrently. Results are applied afterwards in
//! configuration order:
//!
//! | exit | PreToolUse | PostToolUse | UserPromptSubmit | Stop |
//! |------|------------|-------------|------------------|------|
//! | 0 | - | - | stdout injected as a user turn | - |
//! | 2 | tool blocked | stderr as user turn | prompt retracted | stderr as user turn, loop continues |
//! | other | error block | error block | error block | error block |

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::HookConfig;
use super::runner::HookRunner;
use super::types::{ExitClass, HookEvent, HookExecutionResult, HookJsonInput};
use crate::blocks::{Block, BlockStore, MessageId};

/// Error code stored on a tool block vetoed by a PreToolUse hook
pub const BLOCKED_BY_HOOK: &str = "blocked_by_hook";

/// Event-specific data handed to hooks
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub tool_use_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
    pub prompt: Option<String>,
    /// Store id of the user turn a UserPromptSubmit block retracts
    pub prompt_message: Option<MessageId>,
}

impl HookContext {
    pub fn prompt(prompt: impl Into<String>, message_id: MessageId) -> Self {
        Self {
            prompt: Some(prompt.into()),
            prompt_message: Some(message_id),
            ..Default::default()
        }
    }

    pub fn pre_tool(tool_use_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            tool_use_id: Some(tool_use_id.into()),
            tool_name: Some(tool_name.into()),
            tool_input: Some(input),
            ..Default::default()
        }
    }

    pub fn post_tool(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Value,
        response: Value,
    ) -> Self {
        Self {
            tool_use_id: Some(tool_use_id.into()),
            tool_name: Some(tool_name.into()),
            tool_input: Some(input),
            tool_response: Some(response),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self::default()
    }
}

/// What a dispatch did; the agent loop derives control flow from this
#[derive(Debug, Default)]
pub struct HookDispatch {
    /// In configuration order
    pub results: Vec<HookExecutionResult>,
    /// First exit-2 message, if any hook blocked
    pub blocked: Option<String>,
    /// User turns added (stdout context or exit-2 feedback)
    pub injected_turns: usize,
    /// The tool signal fired while hooks ran; nothing was applied
    pub aborted: bool,
}

impl HookDispatch {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Default::default()
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }
}

pub struct HookDispatcher {
    config: HookConfig,
    runner: HookRunner,
    session_id: String,
    transcript_path: String,
}

impl HookDispatcher {
    pub fn new(
        config: HookConfig,
        runner: HookRunner,
        session_id: impl Into<String>,
        transcript_path: impl Into<String>,
    ) -> Self {
        Self {
            config,
            runner,
            session_id: session_id.into(),
            transcript_path: transcript_path.into(),
        }
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    fn build_input(&self, event: HookEvent, ctx: &HookContext) -> HookJsonInput {
        HookJsonInput {
            session_id: self.session_id.clone(),
            transcript_path: self.transcript_path.clone(),
            cwd: self.runner.project_dir().display().to_string(),
            hook_event_name: event,
            tool_name: ctx.tool_name.clone(),
            tool_input: ctx.tool_input.clone(),
            tool_response: ctx.tool_response.clone(),
            prompt: ctx.prompt.clone(),
        }
    }

    /// Run the hooks for `event` and apply their results to `store`
    pub async fn dispatch(
        &self,
        event: HookEvent,
        ctx: HookContext,
        store: &mut BlockStore,
        cancel: &CancellationToken,
    ) -> HookDispatch {
        let commands = self
            .config
            .matching_commands(event, ctx.tool_name.as_deref());
        if commands.is_empty() {
            return HookDispatch::default();
        }
        if cancel.is_cancelled() {
            return HookDispatch::aborted();
        }

        let input = self.build_input(event, &ctx);
        let runs = commands.iter().map(|hook| self.runner.run(hook, &input));

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(event = %event, "Hook run aborted");
                return HookDispatch::aborted();
            }
            results = futures::future::join_all(runs) => results,
        };

        let mut dispatch = HookDispatch::default();
        for result in &results {
            self.apply(event, &ctx, result, store, &mut dispatch);
        }
        dispatch.results = results;
        dispatch
    }

    fn apply(
        &self,
        event: HookEvent,
        ctx: &HookContext,
        result: &HookExecutionResult,
        store: &mut BlockStore,
        dispatch: &mut HookDispatch,
    ) {
        match result.exit_class() {
            ExitClass::Success => {
                if event != HookEvent::UserPromptSubmit || dispatch.is_blocked() {
                    return;
                }
                let context = result.stdout().trim();
                if !context.is_empty() {
                    store.push_user_text(context);
                    dispatch.injected_turns += 1;
                }
            }
            ExitClass::Blocking => {
                let message = match result.stderr().trim() {
                    "" => format!("hook blocked {}", event),
                    stderr => stderr.to_string(),
                };
                self.apply_block(event, ctx, result, message, store, dispatch);
            }
            ExitClass::NonBlocking => {
                let summary = result.failure_summary();
                warn!(
                    event = %event,
                    command = result.command(),
                    exit_code = result.exit_code().unwrap_or(-1),
                    duration_ms = result.duration_ms(),
                    "Hook failed: {}",
                    summary
                );
                store.push_error(format!(
                    "{} hook `{}` failed: {}",
                    event,
                    result.command(),
                    summary
                ));
            }
        }
    }

    fn apply_block(
        &self,
        event: HookEvent,
        ctx: &HookContext,
        result: &HookExecutionResult,
        message: String,
        store: &mut BlockStore,
        dispatch: &mut HookDispatch,
    ) {
        match event {
            HookEvent::PreToolUse | HookEvent::UserPromptSubmit if dispatch.is_blocked() => {
                info!(
                    event = %event,
                    command = result.command(),
                    "Additional hook block ignored: {}",
                    message
                );
            }
            HookEvent::PreToolUse => {
                info!(
                    event = %event,
                    tool = ctx.tool_name.as_deref().unwrap_or_default(),
                    command = result.command(),
                    "Hook blocked tool: {}",
                    message
                );
                if let Some(id) = ctx.tool_use_id.as_deref() {
                    if let Err(e) = store.update_tool_block(id, |b| b.fail(BLOCKED_BY_HOOK, message.clone())) {
                        warn!(tool_use_id = id, "Could not mark tool block as blocked: {}", e);
                    }
                }
                dispatch.blocked = Some(message);
            }
            HookEvent::UserPromptSubmit => {
                info!(event = %event, command = result.command(), "Hook blocked prompt: {}", message);
                if let Some(id) = ctx.prompt_message {
                    // Takes earlier context injections with it; error blocks
                    // from sibling hooks stay visible
                    match store.retract_from(id) {
                        Ok(retracted) => {
                            for error in retracted.iter().flat_map(|m| &m.blocks).filter_map(|b| match b {
                                Block::Error { message } => Some(message.clone()),
                                _ => None,
                            }) {
                                store.push_error(error);
                            }
                        }
                        Err(e) => warn!("Could not retract blocked prompt: {}", e),
                    }
                }
                dispatch.injected_turns = 0;
                store.push_error(message.clone());
                dispatch.blocked = Some(message);
            }
            HookEvent::PostToolUse | HookEvent::Stop => {
                info!(event = %event, command = result.command(), "Hook feedback: {}", message);
                store.push_user_text(message.clone());
                dispatch.injected_turns += 1;
                dispatch.blocked.get_or_insert(message);
            }
        }
    }
}
