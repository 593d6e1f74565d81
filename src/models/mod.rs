//! Data models module
//!
//! Uniform event types emitted by the playground core, plus the
//! chat-completion wire structures spoken by every supported provider

use crate::config::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod openai;

/// Identifies one (provider config, model) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub config_id: String,
    pub model_id: String,
}

impl SessionKey {
    pub fn new(config_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.config_id, self.model_id)
    }
}

/// The prompt pair sent to every selected model
///
/// Exactly one system message followed by exactly one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

impl ChatPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Wire messages in order: system, user
    pub fn to_messages(&self) -> Vec<openai::ChatMessage> {
        vec![
            openai::ChatMessage::system(self.system.clone()),
            openai::ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Normalized token usage
///
/// Each count is optional because providers report partial usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(total_tokens),
        }
    }

    /// True when no count at all was reported
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

/// Timing of one finished session, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDuration {
    /// Elapsed time from session start to finish
    pub total: f64,
    /// Time to the first content fragment, `None` if none arrived
    pub first_token: Option<f64>,
}

/// The uniform unit of output
///
/// Three shapes exist: incremental content (no error, no usage, not
/// finished), normal termination (`finished`, optional usage, duration) and
/// abnormal termination (`error`, never usage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub config_id: String,
    pub model_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<SessionDuration>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub finished: bool,
}

impl StreamEvent {
    /// Incremental content fragment
    pub fn fragment(key: &SessionKey, content: impl Into<String>) -> Self {
        Self {
            config_id: key.config_id.clone(),
            model_id: key.model_id.clone(),
            content: content.into(),
            error: None,
            usage: None,
            duration: None,
            finished: false,
        }
    }

    /// Normal termination
    pub fn finished(key: &SessionKey, usage: Option<Usage>, duration: SessionDuration) -> Self {
        Self {
            config_id: key.config_id.clone(),
            model_id: key.model_id.clone(),
            content: String::new(),
            error: None,
            usage,
            duration: Some(duration),
            finished: true,
        }
    }

    /// Abnormal termination
    pub fn failed(key: &SessionKey, error: impl Into<String>) -> Self {
        Self {
            config_id: key.config_id.clone(),
            model_id: key.model_id.clone(),
            content: String::new(),
            error: Some(error.into()),
            usage: None,
            duration: None,
            finished: false,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.config_id.clone(), self.model_id.clone())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Finished or failed
    pub fn is_terminal(&self) -> bool {
        self.finished || self.error.is_some()
    }
}

/// Which models are selected, per provider config
///
/// Serialized as `{ "configId": { "modelId": true } }`. Entries that point at
/// configs or models that no longer exist are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(HashMap<String, HashMap<String, bool>>);

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every model of every config selected
    pub fn all(configs: &[ProviderConfig]) -> Self {
        let mut selection = Self::new();
        for config in configs {
            for model in &config.models {
                selection.select(&config.id, &model.id);
            }
        }
        selection
    }

    pub fn select(&mut self, config_id: &str, model_id: &str) {
        self.set(config_id, model_id, true);
    }

    pub fn deselect(&mut self, config_id: &str, model_id: &str) {
        self.set(config_id, model_id, false);
    }

    pub fn set(&mut self, config_id: &str, model_id: &str, selected: bool) {
        self.0
            .entry(config_id.to_string())
            .or_default()
            .insert(model_id.to_string(), selected);
    }

    /// Select or deselect every model of one config
    pub fn set_all_models(&mut self, config: &ProviderConfig, selected: bool) {
        let models = config.models.iter().map(|m| (m.id.clone(), selected)).collect();
        self.0.insert(config.id.clone(), models);
    }

    pub fn is_selected(&self, config_id: &str, model_id: &str) -> bool {
        self.0
            .get(config_id)
            .and_then(|models| models.get(model_id))
            .copied()
            .unwrap_or(false)
    }

    /// Whether every model of `config` is selected
    pub fn all_models_selected(&self, config: &ProviderConfig) -> bool {
        config.models.iter().all(|m| self.is_selected(&config.id, &m.id))
    }

    /// Selected pairs in no particular order
    pub fn selected_keys(&self) -> Vec<SessionKey> {
        self.0
            .iter()
            .flat_map(|(config_id, models)| {
                models
                    .iter()
                    .filter(|(_, selected)| **selected)
                    .map(move |(model_id, _)| SessionKey::new(config_id.clone(), model_id.clone()))
            })
            .collect()
    }
}
