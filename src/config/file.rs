//! File-based configuration loading
//!
//! Loads server options and the provider/model store from a JSON file.
//! The store is read-only from the playground's point of view.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host (default: "127.0.0.1" - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 8082)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Fan-out tuning shared by every dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    /// Upper bound on sessions streaming at the same time
    #[serde(rename = "maxConcurrentSessions", default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,

    /// Per-session timeout in seconds, 0 disables it
    #[serde(rename = "sessionTimeoutSecs", default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Capacity of the event channel handed to callers
    #[serde(rename = "channelCapacity", default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// System prompt used when a request does not carry one
    #[serde(rename = "defaultSystemPrompt", default = "default_system_prompt")]
    pub default_system_prompt: String,
}

fn default_max_concurrent_sessions() -> usize {
    32
}

fn default_session_timeout_secs() -> u64 {
    300
}

fn default_channel_capacity() -> usize {
    256
}

/// System prompt used when none is given
pub const DEFAULT_SYSTEM_PROMPT: &str = "You're a helpful assistant.";

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: default_max_concurrent_sessions(),
            session_timeout_secs: default_session_timeout_secs(),
            channel_capacity: default_channel_capacity(),
            default_system_prompt: default_system_prompt(),
        }
    }
}

/// Application configuration loaded from JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (optional, defaults to localhost:8082)
    #[serde(default)]
    pub server: ServerConfig,

    /// Fan-out tuning (optional)
    #[serde(default)]
    pub playground: PlaygroundConfig,

    /// Provider configurations, in display order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Provider kinds the playground knows how to talk to
///
/// Anything else in the store is kept as `Unknown` so that the failure is
/// reported for the sessions that use it instead of rejecting the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    AzureOpenAI,
    OpenAI,
    Groq,
    DeepSeek,
    Unknown(String),
}

impl ProviderKind {
    /// Wire name used in the store
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::AzureOpenAI => "azure-openai",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Unknown(other) => other,
        }
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        match self {
            ProviderKind::AzureOpenAI => "Azure OpenAI",
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Groq => "Groq",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Unknown(other) => other,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ProviderKind::Unknown(_))
    }
}

impl From<String> for ProviderKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "azure-openai" => ProviderKind::AzureOpenAI,
            "openai" => ProviderKind::OpenAI,
            "groq" => ProviderKind::Groq,
            "deepseek" => ProviderKind::DeepSeek,
            _ => ProviderKind::Unknown(value),
        }
    }
}

impl From<&str> for ProviderKind {
    fn from(value: &str) -> Self {
        ProviderKind::from(value.to_string())
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable identifier
    pub id: String,

    /// Provider kind (e.g., "azure-openai", "groq")
    pub provider: ProviderKind,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Base URL for the provider API
    #[serde(rename = "baseUrl", default)]
    pub base_url: String,

    /// API key
    #[serde(rename = "apiKey", default)]
    pub api_key: String,

    /// Models offered by this provider, in display order
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Provider-specific options
    #[serde(default)]
    pub options: ProviderOptions,

    /// Creation time in milliseconds since the epoch
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("models", &self.models)
            .field("options", &self.options)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ProviderConfig {
    /// Find a model by its id
    pub fn model(&self, model_id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == model_id)
    }

    /// Find a model by its provider-side name
    pub fn model_by_name(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Provider-specific options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// API version query parameter (Azure only)
    #[serde(rename = "apiVersion", skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Custom headers to add to requests
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub headers: std::collections::HashMap<String, String>,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Identifier, unique within its provider
    pub id: String,

    /// Model name to use with the upstream provider
    pub name: String,

    /// Azure deployment name, defaults to `name`
    #[serde(rename = "deploymentId", skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,

    /// Price per million prompt tokens
    #[serde(rename = "inputTokenPrice", skip_serializing_if = "Option::is_none")]
    pub input_token_price: Option<f64>,

    /// Price per million completion tokens
    #[serde(rename = "outputTokenPrice", skip_serializing_if = "Option::is_none")]
    pub output_token_price: Option<f64>,
}

impl ModelConfig {
    /// Identifier sent upstream for Azure deployments
    pub fn deployment(&self) -> &str {
        self.deployment_id
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.name)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_json(&content)?;

        debug!("Loaded {} providers", config.providers.len());
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(content).with_context(|| "Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. ~/.config/aiplayground/aiplayground.json
    /// 2. ./aiplayground.json
    ///
    /// Returns error if no configuration file is found.
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("aiplayground").join("aiplayground.json");
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        let local_path = Path::new("aiplayground.json");
        if local_path.exists() {
            return Self::load(local_path);
        }

        anyhow::bail!(
            "Configuration file not found. Please create one at:\n\
             - ~/.config/aiplayground/aiplayground.json (recommended)\n\
             - ./aiplayground.json (current directory)"
        )
    }

    /// Validate configuration
    ///
    /// Empty base URLs and API keys are accepted here: they surface as
    /// per-session configuration errors when the provider is used.
    fn validate(&self) -> Result<()> {
        if self.playground.max_concurrent_sessions == 0 {
            anyhow::bail!("maxConcurrentSessions must be greater than 0");
        }

        if self.playground.channel_capacity == 0 {
            anyhow::bail!("channelCapacity must be greater than 0");
        }

        let mut config_ids = HashSet::new();
        for provider in &self.providers {
            if provider.id.is_empty() {
                anyhow::bail!("Provider '{}' must have an id", provider.name);
            }

            if !config_ids.insert(provider.id.as_str()) {
                anyhow::bail!("Duplicate provider id '{}'", provider.id);
            }

            let mut model_ids = HashSet::new();
            for model in &provider.models {
                if !model_ids.insert(model.id.as_str()) {
                    anyhow::bail!("Duplicate model id '{}' in provider '{}'", model.id, provider.id);
                }

                for price in [model.input_token_price, model.output_token_price].into_iter().flatten() {
                    if !price.is_finite() || price < 0.0 {
                        anyhow::bail!(
                            "Model '{}' in provider '{}' has an invalid price: {}",
                            model.id,
                            provider.id,
                            price
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Get provider configuration by id
    pub fn provider(&self, config_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == config_id)
    }

    /// Get provider and model configuration by id pair
    pub fn get_provider_model(&self, config_id: &str, model_id: &str) -> Option<(&ProviderConfig, &ModelConfig)> {
        let provider = self.provider(config_id)?;
        let model = provider.model(model_id)?;
        Some((provider, model))
    }

    /// List all "configId|modelId" keys
    pub fn list_model_keys(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|p| p.models.iter().map(move |m| format!("{}|{}", p.id, m.id)))
            .collect()
    }
}
