//! Built-in tools and the invoker that runs them

pub mod diff;
pub mod implementations;
pub mod invoker;
pub mod registry;
pub mod truncation;

pub use invoker::{InvokeOutcome, ToolInvoker};
pub use registry::{
    parse_params, Preview, Tool, ToolContext, ToolKind, ToolResult, DEFAULT_TOOL_TIMEOUT,
};

use crate::ai::types::AiTool;
use implementations::{BashTool, DeleteTool, EditTool, ListTool, MultiEditTool, ReadTool, WriteTool};

/// Definition the model sees for `kind`
pub fn definition(kind: ToolKind) -> AiTool {
    match kind {
        ToolKind::Read => ReadTool.definition(),
        ToolKind::List => ListTool.definition(),
        ToolKind::Write => WriteTool.definition(),
        ToolKind::Edit => EditTool.definition(),
        ToolKind::MultiEdit => MultiEditTool.definition(),
        ToolKind::Delete => DeleteTool.definition(),
        ToolKind::Bash => BashTool.definition(),
    }
}

/// Definitions for every built-in tool
pub fn definitions() -> Vec<AiTool> {
    ToolKind::all().iter().map(|k| definition(*k)).collect()
}
