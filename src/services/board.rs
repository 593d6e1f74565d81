//! Response board
//!
//! Caller-side accumulator that folds the event stream into one entry per
//! session: the text so far, the error, usage, timing and cost.

use super::usage::{clamp_multiplier, CostBreakdown};
use crate::config::{ModelConfig, ProviderConfig};
use crate::models::{SessionDuration, SessionKey, StreamEvent, Usage};
use serde::Serialize;
use std::collections::HashMap;

/// Accumulated state of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<SessionDuration>,
    /// Formatted single-request cost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    /// Formatted cost times the multiplier, when above 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaled_cost: Option<String>,
    pub done: bool,
}

impl BoardEntry {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-session view of one send
#[derive(Debug, Clone, Default)]
pub struct ResponseBoard {
    prices: HashMap<SessionKey, ModelConfig>,
    entries: HashMap<SessionKey, BoardEntry>,
    multiplier: u32,
}

impl ResponseBoard {
    pub fn new(configs: &[ProviderConfig], multiplier: u32) -> Self {
        let prices = configs
            .iter()
            .flat_map(|c| {
                c.models
                    .iter()
                    .map(move |m| (SessionKey::new(c.id.clone(), m.id.clone()), m.clone()))
            })
            .collect();

        Self {
            prices,
            entries: HashMap::new(),
            multiplier: clamp_multiplier(multiplier),
        }
    }

    /// Forget every entry before a new send
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Change the multiplier and reprice finished entries
    pub fn set_multiplier(&mut self, multiplier: u32) {
        self.multiplier = clamp_multiplier(multiplier);

        let keys: Vec<SessionKey> = self.entries.keys().cloned().collect();
        for key in keys {
            self.reprice(&key);
        }
    }

    /// Fold one event into the board
    pub fn apply(&mut self, event: &StreamEvent) {
        let key = event.key();
        let entry = self.entries.entry(key.clone()).or_default();

        if entry.done {
            return;
        }

        if let Some(error) = &event.error {
            entry.error = Some(error.clone());
            entry.done = true;
            return;
        }

        entry.content.push_str(&event.content);

        if event.finished || event.usage.is_some() {
            entry.usage = event.usage;
            entry.duration = event.duration;
            entry.done = true;
            self.reprice(&key);
        }
    }

    fn reprice(&mut self, key: &SessionKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let Some(usage) = entry.usage else {
            return;
        };
        let model = self.prices.get(key);

        let breakdown = model.and_then(|m| CostBreakdown::from_usage(&usage, m, self.multiplier));
        entry.cost = breakdown.map(|b| b.formatted_cost());
        entry.scaled_cost = breakdown.and_then(|b| b.formatted_scaled());
    }

    pub fn entry(&self, config_id: &str, model_id: &str) -> Option<&BoardEntry> {
        self.entries.get(&SessionKey::new(config_id, model_id))
    }

    pub fn entries(&self) -> &HashMap<SessionKey, BoardEntry> {
        &self.entries
    }

    /// Whether every entry seen so far has terminated
    pub fn is_settled(&self) -> bool {
        self.entries.values().all(|e| e.done)
    }
}
