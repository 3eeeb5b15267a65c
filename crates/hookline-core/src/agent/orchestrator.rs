//! The agent loop
//!
//! ```text
//!  prompt ──► UserPromptSubmit ──► model call ──► no tool calls ──► Stop ──► done
//!                                     ▲     │                       │
//!                                     │     ▼                       │ exit 2
//!                                     │   for each call, in order:  ▼
//!                                     │     PreToolUse           recurse
//!                                     │     permission gate + apply
//!                                     │     PostToolUse
//!                                     └─────┘
//! ```
//!
//! Recursion is an iterative loop. Every iteration of a turn shares the same
//! `TurnSignals`; the loop returns `TurnOutcome::Aborted` as soon as either
//! signal fires, and nothing is recorded for the interrupted step.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cancellation::TurnSignals;
use super::compress::{needs_compression, summarize, Summary};
use super::loop_events::{LoopEvent, LoopState};
use crate::ai::{AiTool, AiToolCall, ModelBackend, ModelRequest};
use crate::blocks::{Block, BlockStore, MessageId, ToolBlock};
use crate::hooks::{HookContext, HookDispatcher, HookEvent, HookRunner};
use crate::permissions::{PermissionCallback, PermissionGate};
use crate::settings::{MergedSettings, SessionConfig};
use crate::tools::{self, InvokeOutcome, ToolContext, ToolInvoker};

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model stopped requesting tools and no Stop hook objected
    Completed { iterations: usize },
    /// A UserPromptSubmit hook rejected the prompt
    PromptBlocked,
    Aborted,
    /// Backend error, recorded as an error block
    Failed,
    /// `max_iterations` model calls were made without finishing
    IterationLimit,
}

/// Per-call flow inside a tool batch
enum CallFlow {
    Continue,
    Aborted,
}

/// Drives one session: owns the transcript and runs turns against it
pub struct AgentLoop {
    config: SessionConfig,
    backend: Arc<dyn ModelBackend>,
    dispatcher: HookDispatcher,
    invoker: ToolInvoker,
    store: BlockStore,
    tools: Vec<AiTool>,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl AgentLoop {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn ModelBackend>,
        dispatcher: HookDispatcher,
        invoker: ToolInvoker,
    ) -> Self {
        Self {
            config,
            backend,
            dispatcher,
            invoker,
            store: BlockStore::new(),
            tools: tools::definitions(),
            event_tx: None,
        }
    }

    /// Wire hooks, permissions and tools from loaded settings
    pub fn from_settings(
        config: SessionConfig,
        settings: MergedSettings,
        backend: Arc<dyn ModelBackend>,
        callback: Option<Arc<dyn PermissionCallback>>,
    ) -> Self {
        let runner = HookRunner::new(&config.working_dir)
            .with_env(settings.env)
            .with_default_timeout(config.hook_timeout);
        let dispatcher = HookDispatcher::new(
            settings.hooks,
            runner,
            config.session_id.clone(),
            config.transcript_path.display().to_string(),
        );

        let mut gate = PermissionGate::new(config.permission_mode)
            .with_callback_timeout(config.callback_timeout);
        if let Some(callback) = callback {
            gate = gate.with_callback(callback);
        }
        let invoker = ToolInvoker::new(Arc::new(gate)).with_default_timeout(config.tool_timeout);

        Self::new(config, backend, dispatcher, invoker)
    }

    /// Receive `LoopEvent`s on the returned channel
    pub fn subscribe_events(&mut self) -> mpsc::UnboundedReceiver<LoopEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }

    pub fn gate(&self) -> &Arc<PermissionGate> {
        self.invoker.gate()
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn set_state(&self, state: LoopState) {
        debug!(session_id = %self.config.session_id, ?state, "Loop state");
        self.emit(LoopEvent::StateChanged { state });
    }

    /// Run one user turn to completion, abort, or failure
    pub async fn run_turn(&mut self, prompt: &str, signals: &TurnSignals) -> TurnOutcome {
        info!(session_id = %self.config.session_id, "Turn started");
        let outcome = self.drive(prompt, signals).await;
        info!(session_id = %self.config.session_id, ?outcome, "Turn ended");

        self.set_state(LoopState::Idle);
        self.emit(LoopEvent::Finished {
            session_id: self.config.session_id.clone(),
        });
        outcome
    }

    async fn drive(&mut self, prompt: &str, signals: &TurnSignals) -> TurnOutcome {
        if signals.is_aborted() {
            return TurnOutcome::Aborted;
        }
        if self.compress_if_needed(signals).await {
            return TurnOutcome::Aborted;
        }

        let prompt_id = self.store.push_user_text(prompt);
        let dispatch = self
            .dispatcher
            .dispatch(
                HookEvent::UserPromptSubmit,
                HookContext::prompt(prompt, prompt_id),
                &mut self.store,
                &signals.tools,
            )
            .await;
        if dispatch.aborted {
            return TurnOutcome::Aborted;
        }
        if let Some(message) = dispatch.blocked {
            self.emit(LoopEvent::HookBlocked {
                event: HookEvent::UserPromptSubmit,
                message,
            });
            return TurnOutcome::PromptBlocked;
        }

        let mut iterations = 0;
        loop {
            if let Some(max) = self.config.max_iterations {
                if iterations >= max {
                    warn!(session_id = %self.config.session_id, max, "Iteration limit reached");
                    self.store
                        .push_error(format!("Stopped after {} model calls (max_iterations)", max));
                    return TurnOutcome::IterationLimit;
                }
            }
            iterations += 1;

            if iterations > 1 && self.compress_if_needed(signals).await {
                return TurnOutcome::Aborted;
            }

            self.set_state(LoopState::AwaitingModel);
            let request = ModelRequest {
                system: self.config.system_prompt.clone(),
                messages: self.store.model_messages(),
                tools: self.tools.clone(),
            };
            let response = tokio::select! {
                biased;
                _ = signals.model.cancelled() => return TurnOutcome::Aborted,
                response = self.backend.complete(request) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(backend = self.backend.name(), "Model call failed: {:#}", e);
                    let error = format!("Model error: {:#}", e);
                    self.store.push_error(error.clone());
                    self.emit(LoopEvent::Error { error });
                    return TurnOutcome::Failed;
                }
            };
            if signals.is_aborted() {
                return TurnOutcome::Aborted;
            }

            let message_id = self.store.begin_assistant();
            if !response.text.trim().is_empty() {
                let _ = self.store.append_block(
                    message_id,
                    Block::Text {
                        text: response.text.clone(),
                    },
                );
            }

            if response.tool_calls.is_empty() {
                self.emit(LoopEvent::TurnComplete {
                    turn: iterations,
                    has_more: false,
                });
                let stop = self
                    .dispatcher
                    .dispatch(HookEvent::Stop, HookContext::stop(), &mut self.store, &signals.tools)
                    .await;
                if stop.aborted {
                    return TurnOutcome::Aborted;
                }
                if let Some(message) = stop.blocked {
                    info!(session_id = %self.config.session_id, "Stop hook blocked; continuing");
                    self.emit(LoopEvent::HookBlocked {
                        event: HookEvent::Stop,
                        message,
                    });
                    continue;
                }
                return TurnOutcome::Completed { iterations };
            }

            self.set_state(LoopState::ExecutingTools(response.tool_calls.len()));
            for call in &response.tool_calls {
                if signals.is_aborted() {
                    return TurnOutcome::Aborted;
                }
                if let CallFlow::Aborted = self.execute_call(message_id, call, signals).await {
                    return TurnOutcome::Aborted;
                }
            }
            self.emit(LoopEvent::TurnComplete {
                turn: iterations,
                has_more: true,
            });
        }
    }

    /// PreToolUse → permission gate + apply → PostToolUse for one call
    async fn execute_call(
        &mut self,
        message_id: MessageId,
        call: &AiToolCall,
        signals: &TurnSignals,
    ) -> CallFlow {
        let block = ToolBlock::pending(&call.id, &call.name, call.arguments.clone());
        if let Err(e) = self.store.add_tool_block(message_id, block) {
            warn!(tool = %call.name, tool_use_id = %call.id, "Rejected tool call: {}", e);
            self.store.push_error(format!("Skipped tool call: {}", e));
            return CallFlow::Continue;
        }

        let pre = self
            .dispatcher
            .dispatch(
                HookEvent::PreToolUse,
                HookContext::pre_tool(&call.id, &call.name, call.arguments.clone()),
                &mut self.store,
                &signals.tools,
            )
            .await;
        if pre.aborted {
            return CallFlow::Aborted;
        }
        if let Some(message) = pre.blocked {
            info!(tool = %call.name, tool_use_id = %call.id, "Tool blocked by PreToolUse hook");
            self.emit(LoopEvent::ToolResult {
                id: call.id.clone(),
                output: message.clone(),
                is_error: true,
            });
            self.emit(LoopEvent::HookBlocked {
                event: HookEvent::PreToolUse,
                message,
            });
            return CallFlow::Continue;
        }

        self.emit(LoopEvent::ToolExecuting {
            id: call.id.clone(),
            name: call.name.clone(),
        });
        let ctx = ToolContext::new(&self.config.working_dir).with_tool_use_id(&call.id);
        let result = match self.invoker.invoke(call, &ctx, &signals.tools).await {
            InvokeOutcome::Completed(result) => result,
            InvokeOutcome::Aborted => return CallFlow::Aborted,
        };

        info!(
            tool = %call.name,
            tool_use_id = %call.id,
            is_error = result.is_error,
            "Tool finished"
        );
        let _ = self
            .store
            .update_tool_block(&call.id, |block| block.complete(&result));
        if let (false, Some(diff)) = (result.is_error, result.diff.as_ref()) {
            let _ = self.store.append_block(
                message_id,
                Block::Diff {
                    tool_use_id: call.id.clone(),
                    diff: diff.clone(),
                },
            );
        }
        self.emit(LoopEvent::ToolResult {
            id: call.id.clone(),
            output: result.output.clone(),
            is_error: result.is_error,
        });

        let response = serde_json::from_str::<Value>(&result.output)
            .unwrap_or_else(|_| Value::String(result.output.clone()));
        let post = self
            .dispatcher
            .dispatch(
                HookEvent::PostToolUse,
                HookContext::post_tool(&call.id, &call.name, call.arguments.clone(), response),
                &mut self.store,
                &signals.tools,
            )
            .await;
        if post.aborted {
            return CallFlow::Aborted;
        }
        if let Some(message) = post.blocked {
            self.emit(LoopEvent::HookBlocked {
                event: HookEvent::PostToolUse,
                message,
            });
        }
        CallFlow::Continue
    }

    /// Summarize history when it is over the threshold; returns true on abort
    async fn compress_if_needed(&mut self, signals: &TurnSignals) -> bool {
        let estimated_tokens = self.store.estimated_tokens();
        if !needs_compression(estimated_tokens, self.config.compress_threshold_tokens) {
            return false;
        }

        info!(
            session_id = %self.config.session_id,
            estimated_tokens,
            "Compressing conversation"
        );
        match summarize(self.backend.as_ref(), self.store.model_messages(), &signals.model).await {
            Ok(Summary::Text(summary)) => {
                self.store.push_compress(summary);
                self.emit(LoopEvent::Compressed { estimated_tokens });
                false
            }
            Ok(Summary::Aborted) => true,
            Err(e) => {
                warn!("Compression failed, continuing uncompressed: {:#}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ModelResponse, ScriptedBackend};
    use crate::blocks::Role;
    use crate::hooks::{HookCommand, HookConfig};
    use crate::permissions::PermissionMode;
    use serde_json::json;
    use tempfile::TempDir;

    fn agent(dir: &TempDir, backend: Arc<ScriptedBackend>, hooks: HookConfig) -> AgentLoop {
        let mut config = SessionConfig::for_dir(dir.path()).with_session_id("test");
        config.permission_mode = PermissionMode::Bypass;
        let settings = MergedSettings {
            hooks,
            ..Default::default()
        };
        AgentLoop::from_settings(config, settings, backend, None)
    }

    #[tokio::test]
    async fn text_reply_completes_in_one_iteration() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new([ModelResponse::text("hi there")]));
        let mut agent = agent(&dir, backend.clone(), HookConfig::new());
        let mut events = agent.subscribe_events();

        let outcome = agent.run_turn("hello", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::Completed { iterations: 1 });
        assert_eq!(agent.store().messages().len(), 2);
        assert_eq!(agent.store().messages()[1].text(), "hi there");

        let mut saw_finished = false;
        while let Ok(event) = events.try_recv() {
            saw_finished |= matches!(event, LoopEvent::Finished { .. });
        }
        assert!(saw_finished);
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new([
            ModelResponse::text("").with_tool_call("t1", "Write", json!({"file_path": "a.txt", "content": "x\n"})),
            ModelResponse::text("done"),
        ]));
        let mut agent = agent(&dir, backend.clone(), HookConfig::new());

        let outcome = agent.run_turn("write it", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });
        assert!(dir.path().join("a.txt").exists());

        let block = agent.store().tool_block("t1").unwrap();
        assert_eq!(block.success, Some(true));
        let has_diff = agent.store().messages()[1]
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Diff { tool_use_id, .. } if tool_use_id == "t1"));
        assert!(has_diff);

        let second = &backend.requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.role, crate::ai::types::Role::User);
    }

    #[tokio::test]
    async fn backend_error_fails_the_turn() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(Vec::<ModelResponse>::new()));
        let mut agent = agent(&dir, backend, HookConfig::new());

        let outcome = agent.run_turn("hello", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::Failed);
        let last = agent.store().last_message().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.is_error_only());
    }

    #[tokio::test]
    async fn duplicate_tool_id_is_skipped() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new([
            ModelResponse::text("")
                .with_tool_call("t1", "List", Value::Null)
                .with_tool_call("t1", "List", Value::Null),
            ModelResponse::text("done"),
        ]));
        let mut agent = agent(&dir, backend, HookConfig::new());

        let outcome = agent.run_turn("look", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });
        let tools: usize = agent
            .store()
            .messages()
            .iter()
            .map(|m| m.tool_blocks().count())
            .sum();
        assert_eq!(tools, 1);
    }

    #[tokio::test]
    async fn iteration_limit_stops_recursion() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new([
            ModelResponse::text("").with_tool_call("t1", "List", Value::Null),
            ModelResponse::text("").with_tool_call("t2", "List", Value::Null),
        ]));
        let mut agent = agent(&dir, backend.clone(), HookConfig::new());
        agent.config.max_iterations = Some(1);

        let outcome = agent.run_turn("loop", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::IterationLimit);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn model_abort_returns_silently() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new([ModelResponse::text("late")]));
        let mut agent = agent(&dir, backend.clone(), HookConfig::new());
        let signals = TurnSignals::new();
        signals.model.cancel();

        let outcome = agent.run_turn("hello", &signals).await;
        assert_eq!(outcome, TurnOutcome::Aborted);
        assert!(agent.store().messages().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn compression_replaces_history() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new([
            ModelResponse::text("first answer"),
            ModelResponse::text("summary of earlier work"),
            ModelResponse::text("second answer"),
        ]));
        let mut agent = agent(&dir, backend.clone(), HookConfig::new());
        agent.config.compress_threshold_tokens = Some(1);

        agent.run_turn("first", &TurnSignals::new()).await;
        let outcome = agent.run_turn("second", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::Completed { iterations: 1 });

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].tools.is_empty());
        let final_text: Vec<String> = requests[2].messages.iter().map(|m| m.text()).collect();
        assert!(final_text[0].contains("summary of earlier work"));
        assert!(final_text.iter().all(|t| !t.contains("first answer")));
    }

    #[tokio::test]
    async fn post_tool_block_feeds_model() {
        let dir = TempDir::new().unwrap();
        let hooks = HookConfig::new().with_group(
            HookEvent::PostToolUse,
            Some("*"),
            vec![HookCommand::new("echo 'lint failed' >&2; exit 2")],
        );
        let backend = Arc::new(ScriptedBackend::new([
            ModelResponse::text("").with_tool_call("t1", "List", Value::Null),
            ModelResponse::text("fixed"),
        ]));
        let mut agent = agent(&dir, backend.clone(), hooks);

        let outcome = agent.run_turn("go", &TurnSignals::new()).await;
        assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });
        assert_eq!(agent.store().tool_block("t1").unwrap().success, Some(true));
        let second = &backend.requests()[1];
        assert!(second.messages.last().unwrap().text().contains("lint failed"));
    }
}
