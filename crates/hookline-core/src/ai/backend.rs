//! Model backend abstraction
//!
//! The agent loop only needs "given this conversation, what does the model
//! say next". Real providers and test scripts both sit behind this trait.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{ModelRequest, ModelResponse};

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One non-streaming completion
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse>;

    /// Short label for logs
    fn name(&self) -> &str {
        "model"
    }
}

/// Replays a fixed list of responses in order
///
/// Every request is recorded so tests can assert on what the model was shown.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Load a JSON array of `{"text": ..., "tool_calls": [...]}` objects
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        let responses: Vec<ModelResponse> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse script {}", path.display()))?;
        Ok(Self::new(responses))
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted: no more model responses"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ModelMessage;
    use serde_json::json;
    use std::io::Write;

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            system: String::new(),
            messages: vec![ModelMessage::user_text(text)],
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replays_in_order_then_errors() {
        let backend = ScriptedBackend::new(vec![
            ModelResponse::text("one"),
            ModelResponse::text("two"),
        ]);

        assert_eq!(backend.complete(request("a")).await.unwrap().text, "one");
        assert_eq!(backend.complete(request("b")).await.unwrap().text, "two");
        assert!(backend.complete(request("c")).await.is_err());
        assert_eq!(backend.requests().len(), 3);
    }

    #[tokio::test]
    async fn loads_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let script = json!([
            {"text": "", "tool_calls": [{"id": "t1", "name": "Read", "arguments": {"file_path": "a"}}]},
            {"text": "done"}
        ]);
        write!(file, "{}", script).unwrap();

        let backend = ScriptedBackend::from_file(file.path()).unwrap();
        assert_eq!(backend.remaining(), 2);
        let first = backend.complete(request("go")).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "Read");
    }
}
