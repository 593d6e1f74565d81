//! Provider handlers
//!
//! Read-only listing of the configured providers and the connectivity check

use crate::config::{ModelConfig, ProviderConfig};
use crate::handlers::AppState;
use crate::providers::build_http_client;
use crate::services::test_model;
use crate::utils::error::{AppError, AppResult};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const TEST_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider as shown to clients, without its API key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: String,
    pub provider: String,
    pub name: String,
    pub base_url: String,
    /// Whether an API key is configured
    pub has_api_key: bool,
    pub models: Vec<ModelConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl From<&ProviderConfig> for ProviderSummary {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            provider: config.provider.to_string(),
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            has_api_key: !config.api_key.trim().is_empty(),
            models: config.models.clone(),
            created_at: config.created_at,
        }
    }
}

/// List configured providers
///
/// GET /v1/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderSummary>> {
    debug!("Listing {} providers", state.config.providers.len());
    Json(state.config.providers.iter().map(ProviderSummary::from).collect())
}

/// Body of the connectivity check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    /// Identifier sent upstream (deployment name for Azure)
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub success: bool,
}

/// Run the connectivity check against one provider
///
/// POST /v1/providers/:config_id/test
pub async fn test_provider(
    State(state): State<Arc<AppState>>,
    Path(config_id): Path<String>,
    Json(request): Json<TestRequest>,
) -> AppResult<Json<TestResponse>> {
    let config = state
        .config
        .provider(&config_id)
        .ok_or_else(|| AppError::NotFound(format!("Provider '{}'", config_id)))?;

    let client = build_http_client(TEST_CONNECT_TIMEOUT)?;
    test_model(config, &request.model_name, client).await?;

    Ok(Json(TestResponse { success: true }))
}
