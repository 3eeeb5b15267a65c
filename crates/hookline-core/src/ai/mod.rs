//! Model backend layer

pub mod anthropic;
pub mod backend;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use backend::{ModelBackend, ScriptedBackend};
pub use types::{AiTool, AiToolCall, Content, ModelMessage, ModelRequest, ModelResponse};
