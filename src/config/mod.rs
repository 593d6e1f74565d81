//! Configuration management module
//!
//! Provider store loaded from a JSON file plus environment-driven server settings

pub mod file;
pub mod settings;

pub use file::{
    AppConfig, DEFAULT_SYSTEM_PROMPT, ModelConfig, PlaygroundConfig, ProviderConfig, ProviderKind, ProviderOptions, ServerConfig,
};
pub use settings::Settings;
