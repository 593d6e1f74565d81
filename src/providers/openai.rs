//! OpenAI-compatible provider
//!
//! Serves OpenAI, Groq and DeepSeek, which share the `/chat/completions`
//! layout and Bearer authentication. Groq reports usage under `x_groq`,
//! which the stream decoder already understands.

use super::{ensure_model, send_blocking, send_streaming, trim_base_url, BoxStream, Provider, ProviderEvent};
use crate::config::{ProviderConfig, ProviderKind};
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::models::ChatPrompt;
use crate::utils::error::StreamError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use tracing::debug;

/// Adapter for providers speaking the plain OpenAI protocol
pub struct OpenAICompatibleProvider {
    kind: ProviderKind,
    base_url: String,
    api_key: String,
    headers: HashMap<String, String>,
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new(config: &ProviderConfig, client: Client) -> Self {
        Self {
            kind: config.provider.clone(),
            base_url: trim_base_url(&config.base_url).to_string(),
            api_key: config.api_key.clone(),
            headers: config.options.headers.clone(),
            client,
        }
    }

    /// Build the request URL
    pub fn build_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request(&self, body: &ChatCompletionRequest) -> RequestBuilder {
        let mut request = self
            .client
            .post(self.build_url())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json");

        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request.json(body)
    }
}

#[async_trait]
impl Provider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn chat_stream(
        &self,
        model: &str,
        prompt: &ChatPrompt,
    ) -> Result<BoxStream<'static, ProviderEvent>, StreamError> {
        ensure_model(model)?;
        debug!("Opening {} stream for model {}", self.name(), model);

        let body = ChatCompletionRequest::streaming(model, prompt.to_messages());
        send_streaming(self.request(&body)).await
    }

    async fn chat_complete(&self, model: &str, prompt: &ChatPrompt) -> Result<ChatCompletionResponse, StreamError> {
        ensure_model(model)?;
        debug!("Sending {} completion for model {}", self.name(), model);

        let body = ChatCompletionRequest::blocking(model, prompt.to_messages());
        send_blocking(self.request(&body)).await
    }
}
