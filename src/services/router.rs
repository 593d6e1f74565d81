//! Selection router
//!
//! Resolves a selection against the configured providers into the concrete
//! (config, model) pairs that get a session.

use crate::config::{ModelConfig, ProviderConfig};
use crate::models::{SelectionSet, SessionKey};
use tracing::debug;

/// One resolvable selected pair
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub key: SessionKey,
    pub config: ProviderConfig,
    pub model: ModelConfig,
}

/// Resolve `selection` against `configs`
///
/// Targets come out in config order, then model order. Selected entries that
/// point at configs or models that no longer exist are dropped without an
/// event.
pub fn resolve_targets(configs: &[ProviderConfig], selection: &SelectionSet) -> Vec<SessionTarget> {
    let mut targets = Vec::new();

    for config in configs {
        for model in &config.models {
            if selection.is_selected(&config.id, &model.id) {
                targets.push(SessionTarget {
                    key: SessionKey::new(config.id.clone(), model.id.clone()),
                    config: config.clone(),
                    model: model.clone(),
                });
            }
        }
    }

    let selected = selection.selected_keys().len();
    if selected > targets.len() {
        debug!("Skipped {} stale selection entries", selected - targets.len());
    }

    targets
}
