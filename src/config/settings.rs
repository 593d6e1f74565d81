//! Application configuration settings
//!
//! Environment-driven settings for the HTTP surface and logging

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Request configuration
    pub request: RequestConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Allowed origins for CORS
    pub allowed_origins: Vec<String>,
    /// Whether CORS is enabled
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request: RequestConfig {
                max_request_size: 1_048_576,
            },
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
                cors_enabled: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Settings {
    /// Create a new configuration instance
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let settings = Self {
            request: RequestConfig {
                max_request_size: get_env_or_default("MAX_REQUEST_SIZE", "1048576")
                    .parse()
                    .context("Invalid maximum request size")?,
            },
            security: SecurityConfig {
                allowed_origins: get_env_or_default("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                cors_enabled: get_env_or_default("CORS_ENABLED", "true")
                    .parse()
                    .context("Invalid CORS enabled flag")?,
            },
            logging: LoggingConfig {
                level: get_env_or_default("RUST_LOG", "info"),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.request.max_request_size == 0 {
            anyhow::bail!("Maximum request size cannot be 0");
        }

        if self.security.cors_enabled && self.security.allowed_origins.is_empty() {
            anyhow::bail!("ALLOWED_ORIGINS cannot be empty when CORS is enabled");
        }

        // RUST_LOG may carry directives such as "aiplayground=debug", check the bare level only
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !self.logging.level.contains('=') && !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }

    /// Whether every origin is allowed
    pub fn allows_any_origin(&self) -> bool {
        self.security.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
