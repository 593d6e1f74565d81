//! Health check handlers
//!
//! Service status and liveness endpoints

use crate::handlers::AppState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Version information
    pub version: String,
    /// Timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Configured provider configs
    pub providers: usize,
    /// Configured models across all providers
    pub models: usize,
    /// Provider configs whose kind is not supported
    pub unsupported_providers: usize,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<MemoryUsage>,
}

/// Memory usage information
#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub usage_percent: f64,
}

fn response(status: &str, details: Option<HealthDetails>) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        details,
    }
}

/// Basic health check
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Executing health check");

    let providers = &state.config.providers;
    let details = HealthDetails {
        providers: providers.len(),
        models: providers.iter().map(|p| p.models.len()).sum(),
        unsupported_providers: providers.iter().filter(|p| !p.provider.is_supported()).count(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        memory_usage: get_memory_usage(),
    };

    Json(response("healthy", Some(details)))
}

/// Liveness check
///
/// GET /health/live
pub async fn liveness_check() -> Json<HealthResponse> {
    debug!("Executing liveness check");
    Json(response("alive", None))
}

/// Resident and virtual memory from /proc
fn get_memory_usage() -> Option<MemoryUsage> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let read_kb = |prefix: &str| {
            status
                .lines()
                .find(|line| line.starts_with(prefix))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb * 1024)
        };

        let used = read_kb("VmRSS:")?;
        let total = read_kb("VmSize:")?;
        let usage_percent = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Some(MemoryUsage {
            used_bytes: used,
            total_bytes: total,
            usage_percent,
        })
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
