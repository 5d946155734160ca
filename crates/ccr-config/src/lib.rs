//! Router configuration loading and validation (`config.toml` / `config.json`).

pub mod config;
pub mod validate;

pub use config::{
    DEFAULT_LONG_CONTEXT_THRESHOLD, FailoverSettings, FailureTracking, PromptRule,
    ProviderConfig, RouterConfig, RouterSection,
};
pub use validate::{validate_config, validate_loaded_config};
