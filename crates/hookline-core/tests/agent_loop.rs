//! End-to-end properties of the agent loop with real hook processes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::agent::{AbortCoordinator, AgentLoop, TurnOutcome, TurnSignals};
use hookline_core::ai::{ModelResponse, ScriptedBackend};
use hookline_core::blocks::{Block, Role};
use hookline_core::hooks::{HookCommand, HookConfig, HookEvent};
use hookline_core::permissions::{PermissionCallback, PermissionDecision, PermissionMode};
use hookline_core::settings::{MergedSettings, SessionConfig};
use serde_json::json;
use tempfile::TempDir;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn session(dir: &TempDir, mode: PermissionMode) -> SessionConfig {
    let mut config = SessionConfig::for_dir(dir.path()).with_session_id("it");
    config.permission_mode = mode;
    config
}

fn agent(
    dir: &TempDir,
    mode: PermissionMode,
    hooks: HookConfig,
    backend: Arc<ScriptedBackend>,
    callback: Option<Arc<dyn PermissionCallback>>,
) -> AgentLoop {
    let settings = MergedSettings {
        hooks,
        ..Default::default()
    };
    AgentLoop::from_settings(session(dir, mode), settings, backend, callback)
}

fn write_call(id: &str, path: &str) -> ModelResponse {
    ModelResponse::text("").with_tool_call(id, "Write", json!({"file_path": path, "content": "x\n"}))
}

async fn run(agent: &mut AgentLoop, prompt: &str, signals: &TurnSignals) -> TurnOutcome {
    tokio::time::timeout(TEST_TIMEOUT, agent.run_turn(prompt, signals))
        .await
        .expect("turn hung")
}

#[derive(Default)]
struct CountingCallback {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl PermissionCallback for CountingCallback {
    async fn can_use_tool(&self, _tool_name: &str) -> anyhow::Result<PermissionDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("host crashed");
        }
        Ok(PermissionDecision::allow())
    }
}

#[tokio::test]
async fn prompt_hook_context_precedes_model_call() {
    let dir = TempDir::new().unwrap();
    let hooks = HookConfig::new().with_group(
        HookEvent::UserPromptSubmit,
        None,
        vec![HookCommand::new("echo ctx")],
    );
    let backend = Arc::new(ScriptedBackend::new([ModelResponse::text("ok")]));
    let mut agent = agent(&dir, PermissionMode::Default, hooks, backend.clone(), None);

    let outcome = run(&mut agent, "hello", &TurnSignals::new()).await;
    assert_eq!(outcome, TurnOutcome::Completed { iterations: 1 });

    let user_turns: Vec<String> = agent.store().user_messages().map(|m| m.text()).collect();
    assert_eq!(user_turns, vec!["hello".to_string(), "ctx".to_string()]);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].text(), "hello\nctx");
}

#[tokio::test]
async fn prompt_hook_block_retracts_prompt() {
    let dir = TempDir::new().unwrap();
    let hooks = HookConfig::new().with_group(
        HookEvent::UserPromptSubmit,
        None,
        vec![
            HookCommand::new("echo ctx"),
            HookCommand::new("echo 'no secrets' >&2; exit 2"),
        ],
    );
    let backend = Arc::new(ScriptedBackend::new([ModelResponse::text("unused")]));
    let mut agent = agent(&dir, PermissionMode::Default, hooks, backend.clone(), None);

    let outcome = run(&mut agent, "my password is hunter2", &TurnSignals::new()).await;
    assert_eq!(outcome, TurnOutcome::PromptBlocked);
    assert!(backend.requests().is_empty());
    assert_eq!(agent.store().user_messages().count(), 0);

    let last = agent.store().last_message().unwrap();
    assert!(matches!(&last.blocks[0], Block::Error { message } if message == "no secrets"));
}

#[tokio::test]
async fn pre_tool_block_prevents_write() {
    let dir = TempDir::new().unwrap();
    let hooks = HookConfig::new().with_group(
        HookEvent::PreToolUse,
        Some("Write"),
        vec![HookCommand::new("echo nope >&2; exit 2")],
    );
    let backend = Arc::new(ScriptedBackend::new([
        write_call("t1", "a.txt"),
        ModelResponse::text("understood"),
    ]));
    // Default mode with no confirmation consumer: reaching the gate would hang
    let mut agent = agent(&dir, PermissionMode::Default, hooks, backend.clone(), None);

    let outcome = run(&mut agent, "write a.txt", &TurnSignals::new()).await;
    assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });

    let block = agent.store().tool_block("t1").unwrap();
    assert_eq!(block.success, Some(false));
    assert_eq!(block.result.as_deref(), Some("nope"));
    assert!(!dir.path().join("a.txt").exists());
    assert_eq!(agent.gate().queue().pending_len(), 0);
}

#[tokio::test]
async fn stop_hook_block_recurses() {
    let dir = TempDir::new().unwrap();
    let hooks = HookConfig::new().with_group(
        HookEvent::Stop,
        None,
        vec![HookCommand::new(
            "if [ -f stopped ]; then exit 0; fi; touch stopped; echo wait >&2; exit 2",
        )],
    );
    let backend = Arc::new(ScriptedBackend::new([
        ModelResponse::text("done?"),
        ModelResponse::text("really done"),
    ]));
    let mut agent = agent(&dir, PermissionMode::Default, hooks, backend.clone(), None);

    let outcome = run(&mut agent, "go", &TurnSignals::new()).await;
    assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert_eq!(last.text(), "wait");
}

#[tokio::test]
async fn confirmations_are_serial_and_independent() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new([
        ModelResponse::text("")
            .with_tool_call("t1", "Write", json!({"file_path": "a.txt", "content": "a"}))
            .with_tool_call("t2", "Write", json!({"file_path": "b.txt", "content": "b"}))
            .with_tool_call("t3", "Write", json!({"file_path": "c.txt", "content": "c"})),
        ModelResponse::text("done"),
    ]));
    let mut agent = agent(&dir, PermissionMode::Default, HookConfig::new(), backend, None);

    let queue = Arc::clone(agent.gate().queue());
    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..3 {
            let pending = queue.next_request().await;
            assert!(queue.has_active());
            assert_eq!(queue.pending_len(), 0);
            seen.push(pending.request().tool_use_id.clone());
            if pending.request().tool_use_id == "t2" {
                pending.deny("not that one");
            } else {
                pending.allow();
            }
        }
        seen
    });

    let outcome = run(&mut agent, "write three files", &TurnSignals::new()).await;
    assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });
    assert_eq!(consumer.await.unwrap(), vec!["t1", "t2", "t3"]);

    assert!(dir.path().join("a.txt").exists());
    assert!(!dir.path().join("b.txt").exists());
    assert!(dir.path().join("c.txt").exists());

    let denied = agent.store().tool_block("t2").unwrap();
    assert_eq!(denied.success, Some(false));
    assert_eq!(denied.error.as_deref(), Some("permission_denied"));
    assert_eq!(agent.store().tool_block("t3").unwrap().success, Some(true));
}

#[tokio::test]
async fn bypass_skips_callback_and_queue() {
    let dir = TempDir::new().unwrap();
    let callback = Arc::new(CountingCallback::default());
    let as_callback: Arc<dyn PermissionCallback> = callback.clone();
    let backend = Arc::new(ScriptedBackend::new([
        write_call("t1", "a.txt"),
        ModelResponse::text("done"),
    ]));
    let mut agent = agent(
        &dir,
        PermissionMode::Bypass,
        HookConfig::new(),
        backend,
        Some(as_callback),
    );

    let outcome = run(&mut agent, "write", &TurnSignals::new()).await;
    assert_eq!(outcome, TurnOutcome::Completed { iterations: 2 });
    assert!(dir.path().join("a.txt").exists());
    assert_eq!(callback.calls.load(Ordering::SeqCst), 0);
    assert_eq!(agent.gate().queue().pending_len(), 0);
}

#[tokio::test]
async fn failing_callback_denies() {
    let dir = TempDir::new().unwrap();
    let callback = Arc::new(CountingCallback {
        fail: true,
        ..Default::default()
    });
    let as_callback: Arc<dyn PermissionCallback> = callback.clone();
    let backend = Arc::new(ScriptedBackend::new([
        write_call("t1", "a.txt"),
        ModelResponse::text("ok"),
    ]));
    let mut agent = agent(
        &dir,
        PermissionMode::Default,
        HookConfig::new(),
        backend,
        Some(as_callback),
    );

    run(&mut agent, "write", &TurnSignals::new()).await;
    assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
    let block = agent.store().tool_block("t1").unwrap();
    assert_eq!(block.success, Some(false));
    assert_eq!(block.error.as_deref(), Some("permission_denied"));
    assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn abort_during_hook_kills_it_and_skips_tool() {
    let dir = TempDir::new().unwrap();
    let hooks = HookConfig::new().with_group(
        HookEvent::PreToolUse,
        Some("*"),
        vec![HookCommand::new("sleep 0.4; touch hooked")],
    );
    let backend = Arc::new(ScriptedBackend::new([
        write_call("t1", "a.txt"),
        ModelResponse::text("unused"),
    ]));
    let mut agent = agent(&dir, PermissionMode::Bypass, hooks, backend.clone(), None);

    let coordinator = Arc::new(AbortCoordinator::new());
    let signals = coordinator.begin_turn();
    let aborter = Arc::clone(&coordinator);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        aborter.abort_tools();
    });

    let outcome = run(&mut agent, "write", &signals).await;
    assert_eq!(outcome, TurnOutcome::Aborted);
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!dir.path().join("hooked").exists());
    assert!(!dir.path().join("a.txt").exists());
    assert_eq!(backend.requests().len(), 1);

    let block = agent.store().tool_block("t1").unwrap();
    assert!(!block.is_finished());
}

#[tokio::test]
async fn abort_while_awaiting_confirmation() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new([
        ModelResponse::text("").with_tool_call("t1", "Bash", json!({"command": "touch ran"})),
        ModelResponse::text("unused"),
    ]));
    let mut agent = agent(&dir, PermissionMode::Default, HookConfig::new(), backend, None);

    let coordinator = Arc::new(AbortCoordinator::new());
    let signals = coordinator.begin_turn();
    let aborter = Arc::clone(&coordinator);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        aborter.abort();
    });

    let outcome = run(&mut agent, "run it", &signals).await;
    assert_eq!(outcome, TurnOutcome::Aborted);
    assert_eq!(agent.gate().queue().pending_len(), 0);
    assert!(!dir.path().join("ran").exists());

    let block = agent.store().tool_block("t1").unwrap();
    assert!(!block.is_finished());
    assert!(!coordinator.begin_turn().is_aborted());
}
