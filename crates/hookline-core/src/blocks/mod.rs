//! Conversation data model
//!
//! A session is an ordered list of `Message`s, each owning ordered `Block`s.
//! `BlockStore` is the single owner of that list: the agent loop mutates it
//! through an explicit append/update API and presentation layers subscribe
//! to `BlockEvent`s instead of sharing state.

mod convert;
mod model;
mod store;

pub use convert::to_model_messages;
pub use model::{Block, Message, MessageId, Role, ToolBlock};
pub use store::{BlockEvent, BlockStore, BlockStoreError};
