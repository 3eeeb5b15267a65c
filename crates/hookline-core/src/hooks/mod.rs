//! User-configured hooks
//!
//! Shell commands attached to agent lifecycle points. They can observe,
//! add context, or veto based on exit codes.
//!
//! ## Exit Code Protocol
//! - 0: success (stdout is model context for UserPromptSubmit only)
//! - 2: block, stderr explains why
//! - Other: warn the user with stderr, continue

mod config;
mod dispatcher;
mod runner;
mod types;

pub use config::{HookCommand, HookConfig};
pub use dispatcher::{HookContext, HookDispatch, HookDispatcher, BLOCKED_BY_HOOK};
pub use runner::{HookRunner, DEFAULT_HOOK_TIMEOUT, PROJECT_DIR_ENV};
pub use types::{ExitClass, HookEvent, HookExecutionResult, HookJsonInput};
