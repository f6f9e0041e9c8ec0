//! CLI commands for managing the Telegram webhook registration.

use std::time::Duration;

use {
    anyhow::{Context, bail},
    clap::Subcommand,
    courier_config::CourierConfig,
    courier_telegram::TelegramClient,
    secrecy::ExposeSecret,
};

#[derive(Subcommand)]
pub enum WebhookAction {
    /// Register `<url>/telegram-webhook` with Telegram.
    Set {
        /// Public base URL (defaults to TELEGRAM_CONNECT_URL).
        #[arg(long)]
        url: Option<String>,
    },
    /// Show the current registration.
    Info,
    /// Remove the registration.
    Delete,
}

fn client(config: &CourierConfig) -> anyhow::Result<TelegramClient> {
    if config.telegram.token.expose_secret().trim().is_empty() {
        bail!("TELEGRAM_BOT_TOKEN is not set");
    }
    TelegramClient::new(
        &config.telegram.token,
        &config.telegram.api_base,
        Duration::from_secs(config.telegram.timeout_secs),
    )
    .context("failed to create Telegram client")
}

pub async fn handle_webhook(action: WebhookAction, config: &CourierConfig) -> anyhow::Result<()> {
    let client = client(config)?;

    match action {
        WebhookAction::Set { url } => {
            let Some(public_url) = url.or_else(|| config.telegram.public_url.clone()) else {
                bail!("no public URL: pass --url or set TELEGRAM_CONNECT_URL");
            };
            let secret = config
                .telegram
                .webhook_secret
                .as_ref()
                .map(|s| s.expose_secret().as_str());
            let url = client.set_webhook(&public_url, secret).await?;
            println!("Webhook set to {url}");
        },
        WebhookAction::Info => {
            let info = client.get_webhook_info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        },
        WebhookAction::Delete => {
            client.delete_webhook().await?;
            println!("Webhook deleted");
        },
    }

    Ok(())
}
