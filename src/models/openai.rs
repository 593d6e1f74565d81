//! Chat-completion wire models
//!
//! Request and response structures shared by OpenAI, Azure OpenAI, Groq and
//! DeepSeek. Response fields are lenient because providers omit different
//! parts of the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name (ignored by Azure, which routes by deployment)
    pub model: String,
    /// Message list
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Streaming options (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Maximum tokens to generate (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    /// Streaming request that asks for the final usage chunk
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: Some(true),
            stream_options: Some(StreamOptions { include_usage: true }),
            max_tokens: None,
        }
    }

    /// Non-streaming request
    pub fn blocking(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: None,
            stream_options: None,
            max_tokens: None,
        }
    }
}

/// Stream options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Ask for a trailing chunk carrying usage
    pub include_usage: bool,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (system/user/assistant)
    pub role: String,
    /// Text content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Usage block as reported on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Chunk ID
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Choice list, empty on the trailing usage chunk
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage (OpenAI, DeepSeek, Azure)
    #[serde(default)]
    pub usage: Option<WireUsage>,
    /// Groq extension carrying usage on the last chunk
    #[serde(default)]
    pub x_groq: Option<GroqExtension>,
    /// Error reported in the middle of a stream
    #[serde(default)]
    pub error: Option<Value>,
}

/// Streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Delta content
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Streaming delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Groq `x_groq` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroqExtension {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

impl ChatCompletionChunk {
    /// Concatenated text of all choice deltas
    pub fn content(&self) -> String {
        self.choices
            .iter()
            .filter_map(|c| c.delta.content.as_deref())
            .collect()
    }

    /// Usage from wherever this provider puts it
    pub fn wire_usage(&self) -> Option<WireUsage> {
        self.usage
            .or_else(|| self.x_groq.as_ref().and_then(|x| x.usage))
    }
}

/// Non-streaming response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// Non-streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Non-streaming message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Pull the provider's own message out of an error payload
///
/// Accepts `{"error": {"message": ...}}`, `{"error": "..."}`, a bare
/// `{"message": ...}` and the inner error object itself.
pub fn extract_error_message(value: &Value) -> Option<String> {
    let candidate = match value.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        None => value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    candidate
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Same as [`extract_error_message`] for a raw response body
pub fn extract_error_message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| extract_error_message(&v))
}
