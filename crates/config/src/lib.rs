//! Configuration loading, env substitution, env overrides, and validation.
//!
//! Config files: `courier.toml`, `courier.yaml`, `courier.yml` or `courier.json`,
//! searched in `./` then the user config directory (`~/.config/courier/`).
//!
//! Supports `${ENV_VAR}` substitution in all string values. The process
//! environment (`GOOGLE_API_KEY`, `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CONNECT_URL`,
//! ...) overrides file values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{AgentConfig, CourierConfig, ServerConfig, SessionsConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_required},
};
