//! Provider module
//!
//! Defines the Provider trait and one adapter per supported provider kind.
//! Every adapter speaks the chat-completion streaming protocol; they differ
//! in URL layout, auth header and where the final usage record lives.

pub mod azure;
pub mod openai;
pub mod sse;

use crate::config::{ModelConfig, ProviderConfig, ProviderKind};
use crate::models::openai::{extract_error_message_from_body, ChatCompletionResponse, WireUsage};
use crate::models::ChatPrompt;
use crate::utils::error::StreamError;
use crate::utils::logging::truncate_content;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::{debug, warn};

pub use azure::AzureOpenAIProvider;
pub use openai::OpenAICompatibleProvider;
pub use sse::{ChatCompletionStream, SseDecoder};

/// A boxed stream of provider events
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T, StreamError>> + Send + 'a>>;

/// What an open provider stream yields
///
/// Zero or more fragments, then exactly one `Finished` or one `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A piece of generated text
    Fragment(String),
    /// Normal end of stream with whatever usage the provider reported
    Finished(Option<WireUsage>),
}

/// Provider trait for upstream chat-completion APIs
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Identifier sent upstream for `model`
    fn upstream_model<'a>(&self, model: &'a ModelConfig) -> &'a str {
        &model.name
    }

    /// Open a streaming chat completion
    async fn chat_stream(
        &self,
        model: &str,
        prompt: &ChatPrompt,
    ) -> Result<BoxStream<'static, ProviderEvent>, StreamError>;

    /// Send a non-streaming chat completion
    async fn chat_complete(&self, model: &str, prompt: &ChatPrompt) -> Result<ChatCompletionResponse, StreamError>;
}

/// Build the adapter for a provider configuration
///
/// Checks credentials before the kind, and both before any network I/O.
pub fn build_provider(config: &ProviderConfig, client: Client) -> Result<Arc<dyn Provider>, StreamError> {
    if config.base_url.trim().is_empty() {
        return Err(StreamError::Configuration(format!(
            "Missing base URL for provider '{}'",
            display_name(config)
        )));
    }

    if config.api_key.trim().is_empty() {
        return Err(StreamError::Configuration(format!(
            "Missing API key for provider '{}'",
            display_name(config)
        )));
    }

    let provider: Arc<dyn Provider> = match &config.provider {
        ProviderKind::AzureOpenAI => Arc::new(AzureOpenAIProvider::new(config, client)),
        ProviderKind::OpenAI | ProviderKind::Groq | ProviderKind::DeepSeek => {
            Arc::new(OpenAICompatibleProvider::new(config, client))
        }
        ProviderKind::Unknown(kind) => return Err(StreamError::UnsupportedProvider(kind.clone())),
    };

    debug!("Built {} provider for config {}", provider.name(), config.id);
    Ok(provider)
}

/// HTTP client used for provider calls
///
/// Idle pooling is disabled so each session opens its own connection and
/// nothing outlives the session that created it.
pub fn build_http_client(connect_timeout: Duration) -> Result<Client, StreamError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(0)
        .user_agent(concat!("aiplayground/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| StreamError::Transport(format!("Failed to create HTTP client: {}", e)))
}

fn display_name(config: &ProviderConfig) -> &str {
    if config.name.is_empty() {
        &config.id
    } else {
        &config.name
    }
}

pub(crate) fn ensure_model(model: &str) -> Result<(), StreamError> {
    if model.trim().is_empty() {
        return Err(StreamError::Configuration("Missing model identifier".to_string()));
    }
    Ok(())
}

pub(crate) fn trim_base_url(base_url: &str) -> &str {
    base_url.trim().trim_end_matches('/')
}

/// Turn a non-2xx response into a provider error
///
/// Prefers the provider's nested error message, then the status line.
pub(crate) async fn error_from_response(response: reqwest::Response) -> StreamError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = extract_error_message_from_body(&body).unwrap_or_else(|| {
        let body = body.trim();
        if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate_content(body, 200))
        }
    });

    warn!("Provider request failed: {} - {}", status, message);
    StreamError::Provider {
        status: Some(status.as_u16()),
        message,
    }
}

/// Send a streaming request and wrap the body as provider events
pub(crate) async fn send_streaming(request: RequestBuilder) -> Result<BoxStream<'static, ProviderEvent>, StreamError> {
    let response = request
        .header("Accept", "text/event-stream")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    Ok(Box::pin(ChatCompletionStream::new(response.bytes_stream())))
}

/// Send a non-streaming request and parse the completion
pub(crate) async fn send_blocking(request: RequestBuilder) -> Result<ChatCompletionResponse, StreamError> {
    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| StreamError::Provider {
        status: None,
        message: format!("Failed to parse completion response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn config(json: &str) -> ProviderConfig {
        AppConfig::from_json(&format!(r#"{{"providers": [{}]}}"#, json))
            .unwrap()
            .providers
            .remove(0)
    }

    fn client() -> Client {
        build_http_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_provider_kinds() {
        for (kind, name) in [
            ("openai", "openai"),
            ("groq", "groq"),
            ("deepseek", "deepseek"),
            ("azure-openai", "azure-openai"),
        ] {
            let cfg = config(&format!(
                r#"{{"id": "c", "provider": "{}", "baseUrl": "https://example.com", "apiKey": "k", "models": []}}"#,
                kind
            ));
            let provider = build_provider(&cfg, client()).unwrap();
            assert_eq!(provider.name(), name);
        }
    }

    #[test]
    fn test_build_provider_missing_base_url() {
        let cfg = config(r#"{"id": "c", "provider": "openai", "apiKey": "k", "models": []}"#);
        let err = build_provider(&cfg, client()).err().unwrap();
        assert!(matches!(err, StreamError::Configuration(_)));
    }

    #[test]
    fn test_build_provider_missing_api_key() {
        let cfg = config(r#"{"id": "c", "provider": "groq", "baseUrl": "https://x", "models": []}"#);
        let err = build_provider(&cfg, client()).err().unwrap();
        assert!(matches!(err, StreamError::Configuration(msg) if msg.contains("API key")));
    }

    #[test]
    fn test_build_provider_unsupported_kind() {
        let cfg = config(r#"{"id": "c", "provider": "ollama", "baseUrl": "https://x", "apiKey": "k", "models": []}"#);
        let err = build_provider(&cfg, client()).err().unwrap();
        assert_eq!(err, StreamError::UnsupportedProvider("ollama".to_string()));
    }

    #[test]
    fn test_configuration_checked_before_kind() {
        let cfg = config(r#"{"id": "c", "provider": "ollama", "models": []}"#);
        let err = build_provider(&cfg, client()).err().unwrap();
        assert!(matches!(err, StreamError::Configuration(_)));
    }

    #[test]
    fn test_ensure_model() {
        assert!(ensure_model("gpt-4o").is_ok());
        assert!(matches!(ensure_model("  "), Err(StreamError::Configuration(_))));
    }

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("https://api.openai.com/v1/"), "https://api.openai.com/v1");
        assert_eq!(trim_base_url(" https://x/v1 "), "https://x/v1");
    }
}
