//! Logging utilities
//!
//! Subscriber setup and helpers that keep prompts and secrets out of logs

use crate::config::settings::LoggingConfig;
use crate::models::ChatPrompt;
use anyhow::Result;

/// Set to true to log full prompts instead of truncated previews
pub const VERBOSE_PROMPT_LOGGING: bool = false;

/// Initialize the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if config.format == "json" {
        // JSON format logs (production environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(config.level.clone())
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .finish(),
        )
    } else {
        // Human readable format (development environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(config.level.clone())
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::info!("Logging system initialized");
    Ok(())
}

/// Truncate a string with a note about original length
pub fn truncate_content(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_len {
        let head: String = s.chars().take(max_len).collect();
        format!("{}... ({} chars truncated)", head, char_count - max_len)
    } else {
        s.to_string()
    }
}

/// Create a filtered summary of a prompt for logging
pub fn create_prompt_log_summary(prompt: &ChatPrompt) -> serde_json::Value {
    if VERBOSE_PROMPT_LOGGING {
        serde_json::to_value(prompt).unwrap_or(serde_json::json!({"error": "serialize failed"}))
    } else {
        serde_json::json!({
            "system": truncate_content(&prompt.system, 100),
            "user": truncate_content(&prompt.user, 200),
        })
    }
}
