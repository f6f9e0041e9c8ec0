//! Process startup and shutdown hooks.
//!
//! Startup refuses to proceed without the required configuration values but
//! treats webhook registration failures as non-fatal. Shutdown waits for
//! in-flight turns, deregisters the webhook and releases the Bot API client.

use std::{sync::Arc, time::Duration};

use {
    courier_config::{CourierConfig, Severity, TelegramConfig, validate, validate_required},
    courier_telegram::{TelegramClient, client::webhook_url},
    secrecy::ExposeSecret,
    tracing::{error, info, warn},
};

use crate::{dispatcher::WebhookDispatcher, error::Result};

/// Resources acquired at startup and released at shutdown.
pub struct Lifecycle {
    client: Arc<TelegramClient>,
    telegram: TelegramConfig,
    grace: Duration,
}

impl Lifecycle {
    /// Validate configuration, build the Bot API client and register the
    /// webhook.
    ///
    /// Fails only on missing configuration or an unusable client.
    pub async fn startup(config: &CourierConfig) -> Result<Self> {
        validate_required(config)?;

        for diagnostic in validate(config).diagnostics {
            match diagnostic.severity {
                Severity::Error => {
                    error!(path = %diagnostic.path, "{}", diagnostic.message)
                },
                Severity::Warning => {
                    warn!(path = %diagnostic.path, "{}", diagnostic.message)
                },
            }
        }

        let telegram = config.telegram.clone();
        let client = Arc::new(TelegramClient::new(
            &telegram.token,
            &telegram.api_base,
            Duration::from_secs(telegram.timeout_secs),
        )?);

        let lifecycle = Self {
            client,
            telegram,
            grace: Duration::from_secs(config.server.shutdown_grace_secs),
        };
        if lifecycle.telegram.manage_webhook {
            lifecycle.register_webhook().await;
        } else {
            info!("webhook management disabled, skipping registration");
        }
        Ok(lifecycle)
    }

    /// Shared handle to the one Bot API client; hand it to the dispatcher.
    pub fn client(&self) -> Arc<TelegramClient> {
        Arc::clone(&self.client)
    }

    async fn register_webhook(&self) {
        let Some(public_url) = self.telegram.public_url.as_deref() else {
            return;
        };
        let secret = self
            .telegram
            .webhook_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str());

        match self.client.set_webhook(public_url, secret).await {
            Ok(url) => info!(url = %url, "webhook registered"),
            Err(e) => error!(url = %webhook_url(public_url), error = %e, "webhook registration failed"),
        }

        match self.client.get_webhook_info().await {
            Ok(info) => info!(
                url = info.url.as_deref().unwrap_or(""),
                pending_updates = info.pending_update_count,
                last_error = info.last_error_message.as_deref().unwrap_or(""),
                "webhook info"
            ),
            Err(e) => warn!(error = %e, "failed to query webhook info"),
        }
    }

    /// Drain in-flight turns and deregister the webhook, then drop the
    /// dispatcher and the client.
    ///
    /// The connection pool closes here unless some other handle to the
    /// dispatcher or the client is still alive.
    pub async fn shutdown(self, dispatcher: Arc<WebhookDispatcher>) {
        info!("shutting down");
        dispatcher.drain(self.grace).await;

        if self.telegram.manage_webhook {
            match self.client.delete_webhook().await {
                Ok(()) => info!("webhook deregistered"),
                Err(e) => warn!(error = %e, "failed to deregister webhook"),
            }
        }

        drop(dispatcher);
        let released = Arc::strong_count(&self.client) == 1;
        drop(self.client);
        info!(client_released = released, "shutdown complete");
    }
}
