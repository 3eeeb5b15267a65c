//! Anthropic Messages API backend (non-streaming)

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::backend::ModelBackend;
use super::types::{AiTool, AiToolCall, Content, ModelMessage, ModelRequest, ModelResponse, Role};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 8192;

pub struct AnthropicBackend {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Build from `ANTHROPIC_API_KEY`
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY is not set (use --script for an offline run)")?;
        Self::new(api_key, model.unwrap_or_else(|| DEFAULT_MODEL.to_string()))
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(convert_message).collect();
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if !request.system.is_empty() {
            body["system"] = serde_json::json!(request.system);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(convert_tools(&request.tools));
        }
        body
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let body = self.build_body(&request);
        debug!(
            "Anthropic call: model={} messages={}",
            self.model,
            request.messages.len()
        );

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("API error {}: {}", status.as_u16(), text));
        }

        let json: Value = response
            .json()
            .await
            .context("Failed to decode model response")?;
        Ok(parse_response(&json))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

fn convert_message(message: &ModelMessage) -> Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content: Vec<Value> = message.content.iter().map(convert_content).collect();
    serde_json::json!({ "role": role, "content": content })
}

fn convert_content(content: &Content) -> Value {
    match content {
        Content::Text { text } => serde_json::json!({
            "type": "text",
            "text": text
        }),
        Content::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input
        }),
        Content::ToolResult {
            tool_use_id,
            output,
            is_error,
        } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": output,
            "is_error": is_error.unwrap_or(false)
        }),
    }
}

fn convert_tools(tools: &[AiTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            serde_json::json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

fn parse_response(json: &Value) -> ModelResponse {
    let mut response = ModelResponse::default();
    let Some(blocks) = json.get("content").and_then(|c| c.as_array()) else {
        return response;
    };
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(chunk) = block.get("text").and_then(|t| t.as_str()) {
                    response.text.push_str(chunk);
                }
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default();
                let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                response.tool_calls.push(AiToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: block.get("input").cloned().unwrap_or(Value::Null),
                });
            }
            // thinking and other block types are ignored
            _ => {}
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_and_tool_use() {
        let json = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Reading "},
                {"type": "text", "text": "now"},
                {"type": "tool_use", "id": "toolu_1", "name": "Read", "input": {"file_path": "a.rs"}}
            ]
        });
        let response = parse_response(&json);
        assert_eq!(response.text, "Reading now");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments["file_path"], "a.rs");
    }

    #[test]
    fn body_includes_tools_and_system() {
        let backend = AnthropicBackend::new("key", "m").unwrap();
        let request = ModelRequest {
            system: "sys".into(),
            messages: vec![ModelMessage::user_text("hi")],
            tools: vec![AiTool {
                name: "Read".into(),
                description: "read".into(),
                input_schema: json!({"type": "object"}),
            }],
        };
        let body = backend.build_body(&request);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["tools"][0]["name"], "Read");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
    }
}
