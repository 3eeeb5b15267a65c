//! Conversation compression
//!
//! When the history grows past the configured threshold, the backend is asked
//! for a summary which then replaces everything before it (see `Block::Compress`).

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;

use crate::ai::{ModelBackend, ModelMessage, ModelRequest};

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize coding-agent conversations so the work can \
continue with a shorter history. Keep file paths, decisions, commands run and their outcomes, \
open problems, and the user's most recent request verbatim. Reply with the summary only.";

const SUMMARY_REQUEST: &str = "Summarize the conversation so far.";

/// Result of a summarization sub-request
#[derive(Debug)]
pub enum Summary {
    Text(String),
    /// The model-call signal fired
    Aborted,
}

/// Whether `estimated_tokens` exceeds the optional threshold
pub fn needs_compression(estimated_tokens: usize, threshold: Option<usize>) -> bool {
    matches!(threshold, Some(limit) if estimated_tokens > limit)
}

/// Ask the backend to summarize `history`
pub async fn summarize(
    backend: &dyn ModelBackend,
    mut history: Vec<ModelMessage>,
    cancel: &CancellationToken,
) -> Result<Summary> {
    history.push(ModelMessage::user_text(SUMMARY_REQUEST));
    let request = ModelRequest {
        system: SUMMARY_SYSTEM_PROMPT.to_string(),
        messages: history,
        tools: Vec::new(),
    };

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Summary::Aborted),
        response = backend.complete(request) => response?,
    };

    let text = response.text.trim();
    if text.is_empty() {
        return Err(anyhow!("backend returned an empty summary"));
    }
    Ok(Summary::Text(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ModelResponse, ScriptedBackend};

    #[test]
    fn threshold_is_optional() {
        assert!(!needs_compression(10_000, None));
        assert!(!needs_compression(100, Some(100)));
        assert!(needs_compression(101, Some(100)));
    }

    #[tokio::test]
    async fn summary_request_has_no_tools() {
        let backend = ScriptedBackend::new([ModelResponse::text(" short version ")]);
        let summary = summarize(
            &backend,
            vec![ModelMessage::user_text("long history")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(summary, Summary::Text(ref s) if s == "short version"));
        let request = &backend.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].text(), SUMMARY_REQUEST);
    }

    #[tokio::test]
    async fn aborted_before_reply() {
        let backend = ScriptedBackend::new([ModelResponse::text("unused")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = summarize(&backend, Vec::new(), &cancel).await.unwrap();
        assert!(matches!(summary, Summary::Aborted));
    }

    #[tokio::test]
    async fn empty_summary_is_an_error() {
        let backend = ScriptedBackend::new([ModelResponse::text("   ")]);
        let result = summarize(&backend, Vec::new(), &CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
