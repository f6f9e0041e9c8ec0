use std::{fmt, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    teloxide::{
        Bot,
        payloads::SetWebhookSetters,
        requests::Requester,
        types::{ChatId as TelegramChatId, WebhookInfo},
    },
    tracing::{debug, info},
};

use courier_common::ChatId;

use crate::{
    chunk::{TELEGRAM_MAX_MESSAGE_LEN, chunk_message},
    error::{Error, Result},
};

/// Default bound on every Bot API call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Path Telegram pushes updates to, appended to the public base URL.
pub const WEBHOOK_PATH: &str = "/telegram-webhook";

/// Outbound Bot API client.
///
/// Cheap to clone; clones share one connection pool, which is released when
/// the last clone is dropped.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Registration reported by `getWebhookInfo`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WebhookStatus {
    /// `None` when no webhook is registered.
    pub url: Option<String>,
    pub pending_update_count: u32,
    pub last_error_message: Option<String>,
}

impl From<WebhookInfo> for WebhookStatus {
    fn from(info: WebhookInfo) -> Self {
        Self {
            url: info.url.map(|url| url.to_string()),
            pending_update_count: info.pending_update_count,
            last_error_message: info.last_error_message,
        }
    }
}

impl TelegramClient {
    pub fn new(token: &Secret<String>, api_base: &str, timeout: Duration) -> Result<Self> {
        let timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        let http = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .map_err(Error::Client)?;
        // Bot joins method paths onto the API url, so it must end in a slash.
        let api_url = parse_url(&format!("{}/", api_base.trim_end_matches('/')))?;
        let bot = Bot::with_client(token.expose_secret(), http).set_api_url(api_url);
        Ok(Self { bot })
    }

    /// Deliver `text` to `chat_id`, split into several messages when it
    /// exceeds Telegram's size limit.
    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let chunks = chunk_message(text, TELEGRAM_MAX_MESSAGE_LEN);
        let count = chunks.len();
        for chunk in chunks {
            self.bot
                .send_message(TelegramChatId(chat_id), chunk)
                .await
                .map_err(Error::api("sendMessage"))?;
        }
        info!(chat_id, chunks = count, "sent telegram message");
        Ok(())
    }

    /// Dismiss the loading indicator on an inline keyboard button.
    pub async fn answer_callback_query(&self, query_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(query_id)
            .await
            .map_err(Error::api("answerCallbackQuery"))?;
        Ok(())
    }

    /// Register `{public_url}/telegram-webhook` as the delivery URL and
    /// return it.
    pub async fn set_webhook(&self, public_url: &str, secret_token: Option<&str>) -> Result<String> {
        let url = webhook_url(public_url);
        let mut request = self.bot.set_webhook(parse_url(&url)?);
        if let Some(secret) = secret_token {
            request = request.secret_token(secret);
        }
        debug!(url = %url, "telegram setWebhook");
        request.await.map_err(Error::api("setWebhook"))?;
        Ok(url)
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookStatus> {
        let info = self
            .bot
            .get_webhook_info()
            .await
            .map_err(Error::api("getWebhookInfo"))?;
        Ok(info.into())
    }

    /// Remove the webhook registration.
    pub async fn delete_webhook(&self) -> Result<()> {
        self.bot
            .delete_webhook()
            .await
            .map_err(Error::api("deleteWebhook"))?;
        Ok(())
    }
}

/// Full webhook URL for a public base URL.
#[must_use]
pub fn webhook_url(public_url: &str) -> String {
    format!("{}{WEBHOOK_PATH}", public_url.trim_end_matches('/'))
}

fn parse_url(url: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })
}
