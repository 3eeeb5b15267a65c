//! Hookline - terminal coding agent
//!
//! Runs the agent loop from `hookline-core` with:
//! - user and project hooks from `.hookline/settings.json`
//! - a stdin confirmation prompt for restricted tools
//! - Ctrl-C aborting the running turn (a second Ctrl-C exits)

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use hookline_core::agent::{seed_project_memory, AbortCoordinator, AgentLoop, TurnOutcome};
use hookline_core::ai::{AnthropicBackend, ModelBackend, ScriptedBackend};
use hookline_core::paths;
use hookline_core::permissions::PermissionMode;
use hookline_core::settings::{MergedSettings, SessionConfig};

mod confirm;
mod input;
mod render;
mod transcript;

/// Hookline - coding agent with shell hooks and a permission gate
#[derive(Parser)]
#[command(name = "hookline")]
#[command(about = "Coding agent with user-configurable hooks", long_about = None)]
struct Cli {
    /// Run a single prompt and exit; without it, prompts are read from stdin
    prompt: Option<String>,

    /// Run every tool without asking
    #[arg(long)]
    dangerously_skip_permissions: bool,

    /// Working directory
    #[arg(short = 'C', long = "cwd")]
    cwd: Option<PathBuf>,

    /// Model id for the Anthropic backend
    #[arg(long)]
    model: Option<String>,

    /// Replay model responses from a JSON file instead of calling the API
    #[arg(long)]
    script: Option<PathBuf>,

    /// Session id (defaults to a new UUID)
    #[arg(long)]
    session_id: Option<String>,

    /// Stop a turn after this many model calls
    #[arg(long)]
    max_iterations: Option<usize>,
}

/// Log to ~/.hookline/logs/hookline.log, or stderr if that fails
fn init_logging() {
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    let writer = match std::fs::File::create(log_dir.join("hookline.log")) {
        Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
        Err(e) => {
            eprintln!("Failed to create log file: {}, logging to stderr", e);
            BoxMakeWriter::new(std::io::stderr)
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
}

/// First Ctrl-C aborts the running turn; a second one (or one while idle) exits
fn spawn_interrupt_handler(coordinator: Arc<AbortCoordinator>, running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if running.load(Ordering::SeqCst) && !coordinator.current().is_aborted() {
                eprintln!("\n[interrupted]");
                coordinator.abort();
            } else {
                std::process::exit(130);
            }
        }
    });
}

fn build_backend(cli: &Cli) -> Result<Arc<dyn ModelBackend>> {
    match &cli.script {
        Some(script) => Ok(Arc::new(ScriptedBackend::from_file(script)?)),
        None => Ok(Arc::new(AnthropicBackend::from_env(cli.model.clone())?)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let working_dir = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let working_dir = working_dir
        .canonicalize()
        .with_context(|| format!("Invalid working directory {:?}", working_dir))?;

    let mut config = SessionConfig::for_dir(&working_dir);
    if let Some(id) = &cli.session_id {
        config = config.with_session_id(id.clone());
    }
    if cli.dangerously_skip_permissions {
        config.permission_mode = PermissionMode::Bypass;
    }
    config.max_iterations = cli.max_iterations;
    tracing::info!(session_id = %config.session_id, cwd = ?working_dir, "Starting session");

    let settings = MergedSettings::load(
        &paths::user_settings_path(),
        &paths::project_settings_path(&working_dir),
    )
    .await?;
    let backend = build_backend(&cli)?;

    if let Err(e) = paths::ensure_sessions_dir() {
        tracing::warn!("Failed to create sessions directory: {}", e);
    }
    let mut writer = transcript::TranscriptWriter::new(config.transcript_path.clone());

    let mut agent = AgentLoop::from_settings(config, settings, backend, None);
    let renderer = tokio::spawn(render::render_blocks(agent.store_mut().subscribe()));
    seed_project_memory(agent.store_mut(), &working_dir).await;

    let lines = input::spawn_stdin_lines();
    tokio::spawn(confirm::run(Arc::clone(agent.gate().queue()), Arc::clone(&lines)));

    let coordinator = Arc::new(AbortCoordinator::new());
    let running = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&coordinator), Arc::clone(&running));

    let mut one_shot = cli.prompt.clone();
    loop {
        let prompt = match one_shot.take() {
            Some(prompt) => prompt,
            None if cli.prompt.is_some() => break,
            None => {
                print!("> ");
                let _ = std::io::stdout().flush();
                match lines.lock().await.recv().await {
                    Some(line) => line,
                    None => break,
                }
            }
        };
        if prompt.trim().is_empty() {
            continue;
        }

        let signals = coordinator.begin_turn();
        running.store(true, Ordering::SeqCst);
        let outcome = agent.run_turn(&prompt, &signals).await;
        running.store(false, Ordering::SeqCst);

        match outcome {
            TurnOutcome::PromptBlocked => eprintln!("[prompt blocked by hook]"),
            TurnOutcome::IterationLimit => eprintln!("[stopped: iteration limit]"),
            TurnOutcome::Completed { .. } | TurnOutcome::Aborted | TurnOutcome::Failed => {}
        }
        if let Err(e) = writer.append_new(agent.store()).await {
            tracing::warn!("Failed to write transcript: {:#}", e);
        }
    }

    drop(agent);
    let _ = renderer.await;
    Ok(())
}
