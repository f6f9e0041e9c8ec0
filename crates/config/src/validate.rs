//! Startup validation.
//!
//! [`validate_required`] is the fatal gate: the process must not start
//! without a backend credential, a bot credential and a public callback URL.
//! [`validate`] additionally reports non-fatal diagnostics for the startup log.

use {secrecy::ExposeSecret, url::Url};

use crate::{
    error::{Error, Result},
    schema::CourierConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "telegram.public_url".
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Names of the required values, in the order they are reported.
const REQUIRED: &[(&str, &str)] = &[
    ("GOOGLE_API_KEY", "agent.api_key"),
    ("TELEGRAM_BOT_TOKEN", "telegram.token"),
    ("TELEGRAM_CONNECT_URL", "telegram.public_url"),
];

/// Fail with [`Error::ConfigurationMissing`] naming every absent required value.
pub fn validate_required(config: &CourierConfig) -> Result<()> {
    let names: Vec<String> = REQUIRED
        .iter()
        .filter(|(_, path)| !is_present(config, path))
        .map(|(env, path)| format!("{env} ({path})"))
        .collect();

    if names.is_empty() {
        Ok(())
    } else {
        Err(Error::ConfigurationMissing { names })
    }
}

fn is_present(config: &CourierConfig, path: &str) -> bool {
    let value = match path {
        "agent.api_key" => config.agent.api_key.expose_secret().as_str(),
        "telegram.token" => config.telegram.token.expose_secret().as_str(),
        "telegram.public_url" => config.telegram.public_url.as_deref().unwrap_or(""),
        _ => "",
    };
    let value = value.trim();
    // An unexpanded `${VAR}` placeholder counts as missing.
    !value.is_empty() && !value.starts_with("${")
}

/// Collect diagnostics for the whole config. Missing required values are
/// reported as errors; suspicious values as warnings.
#[must_use]
pub fn validate(config: &CourierConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (env, path) in REQUIRED {
        if !is_present(config, path) {
            result.push(Severity::Error, path, format!("required ({env} not set)"));
        }
    }

    if let Some(raw) = config
        .telegram
        .public_url
        .as_deref()
        .filter(|_| is_present(config, "telegram.public_url"))
    {
        match Url::parse(raw) {
            Ok(url) if url.scheme() != "https" => result.push(
                Severity::Warning,
                "telegram.public_url",
                "Telegram only delivers webhooks to https URLs",
            ),
            Ok(_) => {},
            Err(e) => result.push(
                Severity::Error,
                "telegram.public_url",
                format!("not a valid URL: {e}"),
            ),
        }
    }

    if let Err(e) = Url::parse(&config.telegram.api_base) {
        result.push(
            Severity::Error,
            "telegram.api_base",
            format!("not a valid URL: {e}"),
        );
    }

    if config.telegram.timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "telegram.timeout_secs",
            "zero timeout; falling back to 10 seconds",
        );
    }
    if config.agent.turn_timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "agent.turn_timeout_secs",
            "zero timeout; falling back to 120 seconds",
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, secrecy::Secret};

    fn complete() -> CourierConfig {
        let mut cfg = CourierConfig::default();
        cfg.agent.api_key = Secret::new("g-key".into());
        cfg.telegram.token = Secret::new("1:tok".into());
        cfg.telegram.public_url = Some("https://bot.example.com".into());
        cfg
    }

    #[test]
    fn complete_config_passes() {
        let cfg = complete();
        assert!(validate_required(&cfg).is_ok());
        assert!(!validate(&cfg).has_errors());
    }

    #[test]
    fn reports_every_missing_value() {
        let cfg = CourierConfig::default();
        let Err(Error::ConfigurationMissing { names }) = validate_required(&cfg) else {
            panic!("expected ConfigurationMissing");
        };
        assert_eq!(names.len(), 3);
        assert!(names[0].starts_with("GOOGLE_API_KEY"));
        assert!(names[1].starts_with("TELEGRAM_BOT_TOKEN"));
        assert!(names[2].starts_with("TELEGRAM_CONNECT_URL"));
    }

    #[rstest]
    #[case::api_key("GOOGLE_API_KEY")]
    #[case::token("TELEGRAM_BOT_TOKEN")]
    #[case::url("TELEGRAM_CONNECT_URL")]
    fn single_missing_value_is_fatal(#[case] missing: &str) {
        let mut cfg = complete();
        match missing {
            "GOOGLE_API_KEY" => cfg.agent.api_key = Secret::new(String::new()),
            "TELEGRAM_BOT_TOKEN" => cfg.telegram.token = Secret::new("   ".into()),
            _ => cfg.telegram.public_url = None,
        }
        let err = validate_required(&cfg).unwrap_err();
        assert!(err.to_string().contains(missing));
    }

    #[test]
    fn unexpanded_placeholder_counts_as_missing() {
        let mut cfg = complete();
        cfg.telegram.token = Secret::new("${TELEGRAM_BOT_TOKEN}".into());
        assert!(validate_required(&cfg).is_err());
    }

    #[test]
    fn warns_on_plain_http_url() {
        let mut cfg = complete();
        cfg.telegram.public_url = Some("http://bot.example.com".into());
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.severity == Severity::Warning && d.path == "telegram.public_url")
        );
    }

    #[test]
    fn invalid_url_is_an_error() {
        let mut cfg = complete();
        cfg.telegram.public_url = Some("not a url".into());
        assert!(validate(&cfg).has_errors());
    }
}
