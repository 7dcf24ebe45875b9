use crate::tools::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model. `arguments` is the raw JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// One chat completion request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub temperature: f64,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
}

/// Model reply. `content` is kept as raw JSON because providers return either
/// a plain string or an array of typed content parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<serde_json::Value>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(serde_json::Value::String(text.into())),
            tool_calls: Vec::new(),
        }
    }

    /// Flattened textual content, `None` when the reply carries no text.
    pub fn text_content(&self) -> Option<String> {
        self.content.as_ref().and_then(flatten_text)
    }
}

/// Flatten a message content value into plain text.
///
/// A string is used directly; an array has its text segments joined (either
/// bare strings or `{"type": "text", "text": ...}` parts). Anything else is
/// not text-typed.
pub fn flatten_text(content: &serde_json::Value) -> Option<String> {
    match content {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(parts) => {
            let segments: Vec<&str> = parts
                .iter()
                .filter_map(|part| match part {
                    serde_json::Value::String(s) => Some(s.as_str()),
                    serde_json::Value::Object(obj) => {
                        let is_text = obj
                            .get("type")
                            .and_then(|t| t.as_str())
                            .is_none_or(|t| t == "text" || t == "output_text");
                        if is_text {
                            obj.get("text").and_then(|t| t.as_str())
                        } else {
                            None
                        }
                    }
                    _ => None,
                })
                .collect();
            if segments.is_empty() {
                None
            } else {
                Some(segments.join(""))
            }
        }
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("rate limited by provider")]
    RateLimited,
    #[error("provider authentication failed")]
    Authentication,
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ProviderError>;

    /// Stateless single-turn call: one system prompt, one user message, no tools.
    async fn chat_once(
        &self,
        system_prompt: &str,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> Result<ChatResponse, ProviderError> {
        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(message)];
        self.chat(ChatRequest {
            model,
            temperature,
            messages: &messages,
            tools: &[],
        })
        .await
    }
}
