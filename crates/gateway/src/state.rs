use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};

use crate::dispatcher::WebhookDispatcher;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<WebhookDispatcher>,
    webhook_secret: Option<Arc<Secret<String>>>,
}

impl AppState {
    pub fn new(dispatcher: Arc<WebhookDispatcher>, webhook_secret: Option<Secret<String>>) -> Self {
        Self {
            dispatcher,
            webhook_secret: webhook_secret
                .filter(|s| !s.expose_secret().is_empty())
                .map(Arc::new),
        }
    }

    /// Check the `X-Telegram-Bot-Api-Secret-Token` header value.
    ///
    /// Always true when no secret is configured.
    pub fn secret_matches(&self, header: Option<&str>) -> bool {
        match (&self.webhook_secret, header) {
            (None, _) => true,
            (Some(expected), Some(got)) => constant_time_eq(expected.expose_secret(), got),
            (Some(_), None) => false,
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
