use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::CourierConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./courier.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/courier/courier.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CourierConfig::default()` when no file is found or the file
/// fails to parse; required values are checked separately by
/// [`crate::validate_required`].
pub fn discover_and_load() -> CourierConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            match load_config(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    CourierConfig::default()
                },
            }
        },
        None => {
            debug!("no config file found, using defaults");
            CourierConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Overlay process environment values onto `config`.
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Overlay values from `lookup`; empty values are treated as unset.
fn apply_env_overrides_with(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("GOOGLE_API_KEY") {
        config.agent.api_key = Secret::new(key);
    }
    if let Some(model) = get("GEMINI_MODEL") {
        config.agent.model = model;
    }
    if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
        config.telegram.token = Secret::new(token);
    }
    if let Some(url) = get("TELEGRAM_CONNECT_URL") {
        config.telegram.public_url = Some(url);
    }
    if let Some(secret) = get("TELEGRAM_WEBHOOK_SECRET") {
        config.telegram.webhook_secret = Some(Secret::new(secret));
    }
    if let Some(bind) = get("COURIER_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = get("COURIER_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid COURIER_PORT"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let display = path.display().to_string();

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(display, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(display, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(display, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
