//! Connectivity check
//!
//! Sends a single non-streaming "hello" to one model so a user can tell
//! whether a provider config works before selecting it.

use crate::config::{ProviderConfig, DEFAULT_SYSTEM_PROMPT};
use crate::models::ChatPrompt;
use crate::providers::build_provider;
use crate::utils::error::StreamError;
use reqwest::Client;
use tracing::{info, warn};

pub const MISSING_CONFIGURATION_MESSAGE: &str = "Missing required configuration";
pub const CONNECT_FAILURE_MESSAGE: &str = "Could not connect to the API. Please check your Base URL and API Key.";

const TEST_MESSAGE: &str = "hello";

/// Send one short completion to `model_name` on `config`
///
/// `model_name` is the identifier sent upstream (the deployment for Azure).
/// Transport failures are reported with a fixed hint; provider errors keep
/// the provider's own message.
pub async fn test_model(config: &ProviderConfig, model_name: &str, client: Client) -> Result<(), StreamError> {
    if config.base_url.trim().is_empty() || config.api_key.trim().is_empty() || model_name.trim().is_empty() {
        return Err(StreamError::Configuration(MISSING_CONFIGURATION_MESSAGE.to_string()));
    }

    let provider = build_provider(config, client)?;
    let prompt = ChatPrompt::new(DEFAULT_SYSTEM_PROMPT, TEST_MESSAGE);

    match provider.chat_complete(model_name, &prompt).await {
        Ok(_) => {
            info!("Connectivity check passed for {} ({})", config.id, model_name);
            Ok(())
        }
        Err(StreamError::Transport(detail)) => {
            warn!("Connectivity check could not reach {}: {}", config.id, detail);
            Err(StreamError::Transport(CONNECT_FAILURE_MESSAGE.to_string()))
        }
        Err(err) => {
            warn!("Connectivity check failed for {}: {}", config.id, err);
            Err(err)
        }
    }
}
