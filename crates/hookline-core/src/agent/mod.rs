//! Agent system for Hookline
//!
//! - `AgentLoop` - The recursive model/tool loop with its four hook points
//! - `AbortCoordinator` / `TurnSignals` - Independent model-call and tool cancellation
//! - `LoopEvent` - Event protocol between the loop and presentation layers
//! - Project memory and conversation compression

pub mod cancellation;
pub mod compress;
pub mod context;
pub mod loop_events;
pub mod orchestrator;

pub use cancellation::{AbortCoordinator, TurnSignals};
pub use context::{load_project_memory, seed_project_memory};
pub use loop_events::{LoopEvent, LoopState};
pub use orchestrator::{AgentLoop, TurnOutcome};
