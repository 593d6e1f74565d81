//! Azure OpenAI provider
//!
//! Azure routes by deployment in the URL path and authenticates with an
//! `api-key` header instead of a Bearer token.

use super::{ensure_model, send_blocking, send_streaming, trim_base_url, BoxStream, Provider, ProviderEvent};
use crate::config::{ModelConfig, ProviderConfig};
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::models::ChatPrompt;
use crate::utils::error::StreamError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use tracing::debug;

/// API version used when the config does not name one
pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";

/// Azure OpenAI adapter
pub struct AzureOpenAIProvider {
    base_url: String,
    api_key: String,
    api_version: String,
    headers: HashMap<String, String>,
    client: Client,
}

impl AzureOpenAIProvider {
    pub fn new(config: &ProviderConfig, client: Client) -> Self {
        let api_version = config
            .options
            .api_version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Self {
            base_url: trim_base_url(&config.base_url).to_string(),
            api_key: config.api_key.clone(),
            api_version,
            headers: config.options.headers.clone(),
            client,
        }
    }

    /// `{base}/{deployment}/chat/completions?api-version=...`
    pub fn build_url(&self, deployment: &str) -> String {
        format!(
            "{}/{}/chat/completions?api-version={}",
            self.base_url, deployment, self.api_version
        )
    }

    fn request(&self, deployment: &str, body: &ChatCompletionRequest) -> RequestBuilder {
        let mut request = self
            .client
            .post(self.build_url(deployment))
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json");

        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request.json(body)
    }
}

#[async_trait]
impl Provider for AzureOpenAIProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn upstream_model<'a>(&self, model: &'a ModelConfig) -> &'a str {
        model.deployment()
    }

    async fn chat_stream(
        &self,
        deployment: &str,
        prompt: &ChatPrompt,
    ) -> Result<BoxStream<'static, ProviderEvent>, StreamError> {
        ensure_model(deployment)?;
        debug!("Opening Azure stream for deployment {}", deployment);

        let body = ChatCompletionRequest::streaming(deployment, prompt.to_messages());
        send_streaming(self.request(deployment, &body)).await
    }

    async fn chat_complete(&self, deployment: &str, prompt: &ChatPrompt) -> Result<ChatCompletionResponse, StreamError> {
        ensure_model(deployment)?;
        debug!("Sending Azure completion for deployment {}", deployment);

        let body = ChatCompletionRequest::blocking(deployment, prompt.to_messages());
        send_blocking(self.request(deployment, &body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::providers::build_http_client;
    use futures::StreamExt;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn config(base_url: &str, options: &str) -> ProviderConfig {
        AppConfig::from_json(&format!(
            r#"{{"providers": [{{"id": "az", "provider": "azure-openai", "baseUrl": "{}", "apiKey": "azure-key",
                "options": {}, "models": [{{"id": "m", "name": "gpt-4o", "deploymentId": "prod-4o"}}]}}]}}"#,
            base_url, options
        ))
        .unwrap()
        .providers
        .remove(0)
    }

    fn client() -> Client {
        build_http_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_url_default_version() {
        let p = AzureOpenAIProvider::new(&config("https://x.openai.azure.com/openai/deployments/", "{}"), client());
        assert_eq!(
            p.build_url("prod-4o"),
            "https://x.openai.azure.com/openai/deployments/prod-4o/chat/completions?api-version=2024-10-01-preview"
        );
    }

    #[test]
    fn test_build_url_custom_version() {
        let p = AzureOpenAIProvider::new(&config("https://x", r#"{"apiVersion": "2024-06-01"}"#), client());
        assert!(p.build_url("d").ends_with("?api-version=2024-06-01"));
    }

    #[test]
    fn test_upstream_model_is_deployment() {
        let cfg = config("https://x", "{}");
        let p = AzureOpenAIProvider::new(&cfg, client());
        assert_eq!(p.upstream_model(&cfg.models[0]), "prod-4o");
    }

    #[tokio::test]
    async fn test_stream_uses_api_key_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/openai/deployments/prod-4o/chat/completions")
                .query_param("api-version", DEFAULT_API_VERSION)
                .header("api-key", "azure-key");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(concat!(
                    "data: {\"choices\":[],\"prompt_filter_results\":[]}\n\n",
                    "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ok\"}}]}\n\n",
                    "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":1,\"total_tokens\":3}}\n\n",
                    "data: [DONE]\n\n"
                ));
        });

        let p = AzureOpenAIProvider::new(&config(&server.url("/openai/deployments"), "{}"), client());
        let events: Vec<_> = p
            .chat_stream("prod-4o", &ChatPrompt::new("s", "u"))
            .await
            .unwrap()
            .collect()
            .await;

        mock.assert();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok(ProviderEvent::Fragment("ok".to_string())));
    }
}
