use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The backend turn failed or produced no usable answer.
    #[error("reasoning failed: {cause}")]
    ReasoningFailed { cause: String },

    /// The model name cannot be used as a path segment.
    #[error("invalid model name {model:?}")]
    InvalidModel { model: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn reasoning_failed(cause: impl Into<String>) -> Self {
        Self::ReasoningFailed {
            cause: cause.into(),
        }
    }

    #[must_use]
    pub fn no_final_response() -> Self {
        Self::reasoning_failed("no final response")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
