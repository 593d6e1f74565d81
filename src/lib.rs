//! AI Playground Library
//!
//! Sends one prompt pair to many LLM providers at once and streams every
//! answer back as uniform events with usage, timing and cost

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::{AppConfig, ProviderConfig, ProviderKind, Settings};
pub use handlers::{create_router, AppState};
pub use models::{ChatPrompt, SelectionSet, SessionKey, StreamEvent, Usage};
pub use services::{DispatchHandle, DispatchSummary, Orchestrator, ResponseBoard, SendController};
pub use utils::error::{AppError, AppResult, StreamError};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
