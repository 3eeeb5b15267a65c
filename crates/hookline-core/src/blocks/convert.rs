//! BlockStore -> model conversation
//!
//! Tool blocks live inside the assistant message that requested them; the
//! model expects their results in the following user message, so every
//! assistant message with tool blocks is split in two here.

use super::model::{Block, Message, Role};
use crate::ai::types::{Content, ModelMessage};

const INCOMPLETE_TOOL_OUTPUT: &str = "Tool execution did not complete";

/// Build the conversation the model sees from stored messages
///
/// - error and diff blocks are user-visible only and skipped
/// - a compress block drops everything before its message (memory excepted)
/// - consecutive same-role messages are merged
pub fn to_model_messages(messages: &[Message]) -> Vec<ModelMessage> {
    let start = messages
        .iter()
        .rposition(|m| {
            m.blocks
                .iter()
                .any(|b| matches!(b, Block::Compress { .. }))
        })
        .unwrap_or(0);

    let mut result: Vec<ModelMessage> = Vec::new();

    // Project memory survives compression
    for message in &messages[..start] {
        let memory: Vec<Content> = message
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Memory { source, content } => Some(memory_content(source, content)),
                _ => None,
            })
            .collect();
        push_merged(&mut result, Role::User, memory);
    }

    for message in &messages[start..] {
        match message.role {
            Role::User => {
                let content = message.blocks.iter().filter_map(user_content).collect();
                push_merged(&mut result, Role::User, content);
            }
            Role::Assistant => {
                let mut content = Vec::new();
                let mut results = Vec::new();
                for block in &message.blocks {
                    match block {
                        Block::Text { text } if !text.is_empty() => {
                            content.push(Content::Text { text: text.clone() });
                        }
                        Block::Tool(tool) => {
                            content.push(Content::ToolUse {
                                id: tool.id.clone(),
                                name: tool.name.clone(),
                                input: tool.parameters.clone(),
                            });
                            let (output, is_error) = match (&tool.result, tool.success) {
                                (Some(output), Some(success)) => (output.clone(), !success),
                                _ => (INCOMPLETE_TOOL_OUTPUT.to_string(), true),
                            };
                            results.push(Content::ToolResult {
                                tool_use_id: tool.id.clone(),
                                output,
                                is_error: is_error.then_some(true),
                            });
                        }
                        _ => {}
                    }
                }
                push_merged(&mut result, Role::Assistant, content);
                push_merged(&mut result, Role::User, results);
            }
        }
    }

    result
}

fn user_content(block: &Block) -> Option<Content> {
    match block {
        Block::Text { text } => Some(Content::Text { text: text.clone() }),
        Block::Memory { source, content } => Some(memory_content(source, content)),
        Block::Compress { summary } => Some(Content::Text {
            text: format!(
                "[CONVERSATION SUMMARY]\n\n{}\n\n[END CONVERSATION SUMMARY]",
                summary
            ),
        }),
        _ => None,
    }
}

fn memory_content(source: &str, content: &str) -> Content {
    Content::Text {
        text: format!(
            "[PROJECT INSTRUCTIONS - {}]\n\n{}\n\n[END PROJECT INSTRUCTIONS]",
            source, content
        ),
    }
}

fn push_merged(result: &mut Vec<ModelMessage>, role: Role, content: Vec<Content>) {
    if content.is_empty() {
        return;
    }
    match result.last_mut() {
        Some(last) if last.role == role => {
            // Tool results must lead the user message that follows tool_use
            last.content.extend(content);
        }
        _ => result.push(ModelMessage { role, content }),
    }
}
