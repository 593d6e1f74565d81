//! HTTP handlers module
//!
//! Exposes the dispatch stream, the provider listing and connectivity
//! check, and health endpoints

pub mod dispatch;
pub mod health;
pub mod providers;

use crate::config::{AppConfig, Settings};
use crate::middleware::logging::request_logging_middleware;
use crate::services::Orchestrator;
use anyhow::{Context, Result};
use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub config: Arc<AppConfig>,
    pub orchestrator: Orchestrator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, config: AppConfig) -> Result<Self> {
        let orchestrator = Orchestrator::new(&config.playground).context("Failed to create orchestrator")?;

        Ok(Self {
            settings,
            config: Arc::new(config),
            orchestrator,
            started_at: Instant::now(),
        })
    }
}

/// Create application router
pub fn create_router(settings: Settings, config: AppConfig) -> Result<Router> {
    let app_state = Arc::new(AppState::new(settings.clone(), config)?);

    let router = Router::new()
        .route("/v1/dispatch", post(dispatch::handle_dispatch))
        .route("/v1/providers", get(providers::list_providers))
        .route("/v1/providers/:config_id/test", post(providers::test_provider))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            request_logging_middleware,
        ))
        .with_state(app_state);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(settings.request.max_request_size));

    let router = router.layer(middleware_stack);

    if settings.security.cors_enabled {
        Ok(router.layer(cors_layer(&settings)))
    } else {
        Ok(router)
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = if settings.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = settings
            .security
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
