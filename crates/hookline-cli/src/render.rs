//! Plain-text rendering of block changes

use hookline_core::blocks::{Block, BlockEvent, ToolBlock};
use tokio::sync::mpsc;

const MAX_RESULT_PREVIEW: usize = 200;

/// Print every block event until the store is dropped
pub async fn render_blocks(mut events: mpsc::UnboundedReceiver<BlockEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BlockEvent::BlockAppended { block, .. } => render_block(&block),
            BlockEvent::ToolBlockUpdated { block, .. } => render_tool_result(&block),
            BlockEvent::MessageRetracted { .. } => println!("[prompt withdrawn]"),
            BlockEvent::MessageAdded { .. } => {}
        }
    }
}

fn render_block(block: &Block) {
    match block {
        Block::Text { text } => println!("{}", text),
        Block::Tool(tool) => println!("● {}({})", tool.name, tool.parameters_json()),
        Block::Diff { diff, .. } => println!("{}", diff),
        Block::Error { message } => eprintln!("error: {}", message),
        Block::Compress { .. } => println!("[conversation compressed]"),
        Block::Memory { source, .. } => println!("[loaded {}]", source),
    }
}

fn render_tool_result(tool: &ToolBlock) {
    if !tool.is_finished() {
        return;
    }
    let marker = if tool.success == Some(true) { "⎿" } else { "✗" };
    let summary = match (&tool.short_result, &tool.result) {
        (Some(short), _) => short.clone(),
        (None, Some(result)) => preview(result),
        (None, None) => String::new(),
    };
    println!("  {} {}", marker, summary);
}

fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    if first.chars().count() > MAX_RESULT_PREVIEW {
        let cut: String = first.chars().take(MAX_RESULT_PREVIEW).collect();
        format!("{}…", cut)
    } else {
        first.to_string()
    }
}
