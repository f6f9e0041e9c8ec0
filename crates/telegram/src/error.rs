use {teloxide::RequestError, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    /// Inbound payload matches neither a text message nor a callback query.
    #[error("malformed update: {message}")]
    MalformedInput { message: String },

    /// A Bot API call failed: network, timeout, or an `ok: false` answer.
    #[error("telegram {method} request failed: {source}")]
    Telegram {
        method: &'static str,
        #[source]
        source: RequestError,
    },

    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Wrap a `RequestError` from the named Bot API method.
    pub(crate) fn api(method: &'static str) -> impl FnOnce(RequestError) -> Self {
        move |source| Self::Telegram { method, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
