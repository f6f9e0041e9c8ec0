//! Config schema types (server, telegram transport, reasoning agent, sessions).

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default instruction handed to the reasoning backend.
pub const DEFAULT_INSTRUCTION: &str =
    "You are a helpful assistant. Answer user questions using Google Search when needed.";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub agent: AgentConfig,
    pub sessions: SessionsConfig,
}

/// HTTP listener settings for the inbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Upper bound on how long shutdown waits for in-flight turns.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
            shutdown_grace_secs: 30,
        }
    }
}

/// Telegram transport settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Public base URL Telegram pushes updates to (`{public_url}/telegram-webhook`).
    pub public_url: Option<String>,

    /// Bot API base URL. Overridable for tests and self-hosted Bot API servers.
    pub api_base: String,

    /// Timeout for every outbound Bot API call.
    pub timeout_secs: u64,

    /// Optional secret echoed back by Telegram in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub webhook_secret: Option<Secret<String>>,

    /// Register the webhook on startup and remove it on shutdown.
    pub manage_webhook: bool,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("public_url", &self.public_url)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("manage_webhook", &self.manage_webhook)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            public_url: None,
            api_base: "https://api.telegram.org".into(),
            timeout_secs: 10,
            webhook_secret: None,
            manage_webhook: true,
        }
    }
}

/// Reasoning backend (Gemini) settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Gemini API key.
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,

    /// Model ID, e.g. `gemini-2.0-flash`.
    pub model: String,

    /// Generative Language API base URL.
    pub base_url: String,

    /// Application name; first component of every session key.
    pub app_name: String,

    /// System instruction for every turn.
    pub instruction: String,

    /// Attach the `google_search` tool to every turn.
    pub google_search: bool,

    /// Bound on one whole turn (request plus stream consumption).
    pub turn_timeout_secs: u64,

    pub max_output_tokens: u32,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("app_name", &self.app_name)
            .field("google_search", &self.google_search)
            .field("turn_timeout_secs", &self.turn_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            app_name: "courier".into(),
            instruction: DEFAULT_INSTRUCTION.into(),
            google_search: true,
            turn_timeout_secs: 120,
            max_output_tokens: 8192,
        }
    }
}

/// In-memory session cache bounds. Zero means unbounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionsConfig {
    /// Maximum number of live sessions; least recently used are evicted.
    pub max_sessions: usize,
    /// Sessions idle for longer than this are dropped on the next access.
    pub idle_ttl_secs: u64,
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = CourierConfig::default();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.telegram.timeout_secs, 10);
        assert_eq!(cfg.telegram.api_base, "https://api.telegram.org");
        assert_eq!(cfg.agent.model, "gemini-2.0-flash");
        assert!(cfg.agent.google_search);
        assert_eq!(cfg.sessions, SessionsConfig::default());
    }

    #[test]
    fn deserialize_partial_toml() {
        let raw = r#"
            [telegram]
            token = "123:ABC"
            public_url = "https://bot.example.com"

            [sessions]
            max_sessions = 500
        "#;
        let cfg: CourierConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.telegram.token.expose_secret(), "123:ABC");
        assert_eq!(
            cfg.telegram.public_url.as_deref(),
            Some("https://bot.example.com")
        );
        assert_eq!(cfg.sessions.max_sessions, 500);
        // defaults for unspecified fields
        assert_eq!(cfg.telegram.timeout_secs, 10);
        assert_eq!(cfg.agent.app_name, "courier");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut cfg = CourierConfig::default();
        cfg.telegram.token = Secret::new("super-secret-token".into());
        cfg.agent.api_key = Secret::new("super-secret-key".into());
        let out = format!("{cfg:?}");
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[REDACTED]"));
    }
}
