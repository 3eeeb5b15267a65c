//! Owned, append-only-by-default message store
//!
//! Messages are appended and their blocks mutated in place; messages are
//! never reordered. The only removal is `retract_from`, used when a
//! UserPromptSubmit hook rejects the prompt that was just added.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tokio::sync::mpsc;

use super::convert::to_model_messages;
use super::model::{Block, Message, MessageId, Role, ToolBlock};
use crate::ai::types::ModelMessage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockStoreError {
    #[error("tool block '{0}' already exists in this session")]
    DuplicateToolBlock(String),
    #[error("no tool block with id '{0}'")]
    UnknownToolBlock(String),
    #[error("no message with id {0}")]
    UnknownMessage(MessageId),
}

/// Change notification for presentation layers
#[derive(Debug, Clone)]
pub enum BlockEvent {
    MessageAdded { id: MessageId, role: Role },
    BlockAppended { message_id: MessageId, block: Block },
    ToolBlockUpdated { message_id: MessageId, block: ToolBlock },
    MessageRetracted { id: MessageId },
}

/// Single owner of the session transcript
#[derive(Default)]
pub struct BlockStore {
    messages: Vec<Message>,
    next_id: MessageId,
    /// tool-call id -> owning message
    tool_index: HashMap<String, MessageId>,
    /// Every tool-call id ever recorded, including retracted ones
    seen_tool_ids: HashSet<String>,
    subscribers: Vec<mpsc::UnboundedSender<BlockEvent>>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every subsequent mutation as a `BlockEvent`
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<BlockEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages authored by the user (prompts and hook injections)
    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    pub fn tool_block(&self, tool_use_id: &str) -> Option<&ToolBlock> {
        let message_id = self.tool_index.get(tool_use_id)?;
        self.message(*message_id)?
            .tool_blocks()
            .find(|b| b.id == tool_use_id)
    }

    /// Append a user turn holding a single text block
    pub fn push_user_text(&mut self, text: impl Into<String>) -> MessageId {
        self.push_message(Role::User, vec![Block::Text { text: text.into() }])
    }

    /// Append a user turn holding project notes
    pub fn push_memory(&mut self, source: impl Into<String>, content: impl Into<String>) -> MessageId {
        self.push_message(
            Role::User,
            vec![Block::Memory {
                source: source.into(),
                content: content.into(),
            }],
        )
    }

    /// Append a user turn holding a conversation summary
    pub fn push_compress(&mut self, summary: impl Into<String>) -> MessageId {
        self.push_message(
            Role::User,
            vec![Block::Compress {
                summary: summary.into(),
            }],
        )
    }

    /// Start an empty assistant message that blocks will be appended to
    pub fn begin_assistant(&mut self) -> MessageId {
        self.push_message(Role::Assistant, Vec::new())
    }

    /// Append a user-visible error block
    ///
    /// Goes into the trailing assistant message when there is one, otherwise
    /// into a new assistant message.
    pub fn push_error(&mut self, message: impl Into<String>) -> MessageId {
        let block = Block::Error {
            message: message.into(),
        };
        let trailing = self
            .messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.id);
        match trailing {
            Some(id) => {
                self.append_unchecked(id, block);
                id
            }
            None => self.push_message(Role::Assistant, vec![block]),
        }
    }

    /// Append a non-tool block to an existing message
    ///
    /// Tool blocks must go through `add_tool_block` so id uniqueness holds.
    pub fn append_block(&mut self, message_id: MessageId, block: Block) -> Result<(), BlockStoreError> {
        if let Block::Tool(tool) = block {
            return self.add_tool_block(message_id, tool);
        }
        if self.message(message_id).is_none() {
            return Err(BlockStoreError::UnknownMessage(message_id));
        }
        self.append_unchecked(message_id, block);
        Ok(())
    }

    /// Record a tool call; rejects a tool-call id seen before in this session
    pub fn add_tool_block(&mut self, message_id: MessageId, tool: ToolBlock) -> Result<(), BlockStoreError> {
        if self.seen_tool_ids.contains(&tool.id) {
            return Err(BlockStoreError::DuplicateToolBlock(tool.id));
        }
        if self.message(message_id).is_none() {
            return Err(BlockStoreError::UnknownMessage(message_id));
        }
        self.seen_tool_ids.insert(tool.id.clone());
        self.tool_index.insert(tool.id.clone(), message_id);
        self.append_unchecked(message_id, Block::Tool(tool));
        Ok(())
    }

    /// Mutate a tool block in place
    pub fn update_tool_block<F>(&mut self, tool_use_id: &str, update: F) -> Result<(), BlockStoreError>
    where
        F: FnOnce(&mut ToolBlock),
    {
        let message_id = *self
            .tool_index
            .get(tool_use_id)
            .ok_or_else(|| BlockStoreError::UnknownToolBlock(tool_use_id.to_string()))?;
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(BlockStoreError::UnknownMessage(message_id))?;
        let tool = message
            .blocks
            .iter_mut()
            .find_map(|b| match b {
                Block::Tool(tool) if tool.id == tool_use_id => Some(tool),
                _ => None,
            })
            .ok_or_else(|| BlockStoreError::UnknownToolBlock(tool_use_id.to_string()))?;

        update(tool);
        let snapshot = tool.clone();
        self.emit(BlockEvent::ToolBlockUpdated {
            message_id,
            block: snapshot,
        });
        Ok(())
    }

    /// Remove a message and every message after it
    ///
    /// Returns the removed messages, oldest first.
    pub fn retract_from(&mut self, message_id: MessageId) -> Result<Vec<Message>, BlockStoreError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or(BlockStoreError::UnknownMessage(message_id))?;
        let removed: Vec<Message> = self.messages.drain(index..).collect();
        for message in &removed {
            for tool in message.tool_blocks() {
                self.tool_index.remove(&tool.id);
            }
            self.emit(BlockEvent::MessageRetracted { id: message.id });
        }
        Ok(removed)
    }

    /// Conversation as the model backend sees it
    pub fn model_messages(&self) -> Vec<ModelMessage> {
        to_model_messages(&self.messages)
    }

    /// Rough token estimate of the model conversation (chars / 4)
    pub fn estimated_tokens(&self) -> usize {
        let chars: usize = self
            .model_messages()
            .iter()
            .map(ModelMessage::char_len)
            .sum();
        chars / 4
    }

    fn push_message(&mut self, role: Role, blocks: Vec<Block>) -> MessageId {
        self.next_id += 1;
        let id = self.next_id;
        self.messages.push(Message {
            id,
            role,
            blocks: Vec::new(),
        });
        self.emit(BlockEvent::MessageAdded { id, role });
        for block in blocks {
            self.append_unchecked(id, block);
        }
        id
    }

    fn append_unchecked(&mut self, message_id: MessageId, block: Block) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.blocks.push(block.clone());
            self.emit(BlockEvent::BlockAppended { message_id, block });
        }
    }

    fn emit(&mut self, event: BlockEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
