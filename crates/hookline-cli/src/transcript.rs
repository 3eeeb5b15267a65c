//! Append-only JSONL transcript of finished messages

use std::path::PathBuf;

use anyhow::{Context, Result};
use hookline_core::blocks::{BlockStore, MessageId};
use tokio::io::AsyncWriteExt;

pub struct TranscriptWriter {
    path: PathBuf,
    /// Highest message id already written
    written: Option<MessageId>,
}

impl TranscriptWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            written: None,
        }
    }

    /// Append messages added since the last call
    pub async fn append_new(&mut self, store: &BlockStore) -> Result<()> {
        let fresh: Vec<_> = store
            .messages()
            .iter()
            .filter(|m| self.written.map_or(true, |last| m.id > last))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for message in &fresh {
            buf.push_str(&serde_json::to_string(message)?);
            buf.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open transcript {:?}", self.path))?;
        file.write_all(buf.as_bytes()).await?;
        // tokio files write on a background thread; flush before returning
        file.flush().await?;

        self.written = fresh.last().map(|m| m.id);
        Ok(())
    }
}
