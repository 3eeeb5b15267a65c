//! Hookline core library
//!
//! Everything the CLI needs to run an agent session:
//! - `blocks` - Conversation data model (`BlockStore`)
//! - `hooks` - User-configured shell hooks and their exit-code protocol
//! - `permissions` - Permission gate and the serial confirmation queue
//! - `tools` - Built-in tools and the validate/preview/gate/apply contract
//! - `agent` - The agent loop and its two-phase cancellation
//! - `ai` - Model backend abstraction and the Anthropic client

pub mod agent;
pub mod ai;
pub mod blocks;
pub mod hooks;
pub mod paths;
pub mod permissions;
pub mod settings;
pub mod tools;
