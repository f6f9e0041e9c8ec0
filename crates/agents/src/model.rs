use std::pin::Pin;

use {courier_sessions::Session, tokio_stream::Stream};

use crate::error::Result;

/// One item of the streamed response to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    /// Agent or model that produced the event.
    pub author: String,
    pub text: String,
    /// Incremental chunk of a longer answer.
    pub partial: bool,
    /// Marks the event that completes the turn.
    pub is_final: bool,
    pub finish_reason: Option<String>,
}

impl ResponseEvent {
    pub fn partial(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            partial: true,
            is_final: false,
            finish_reason: None,
        }
    }

    pub fn final_response(
        author: impl Into<String>,
        text: impl Into<String>,
        finish_reason: Option<String>,
    ) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            partial: false,
            is_final: true,
            finish_reason,
        }
    }

    /// A final event carrying a non-empty answer ends the turn.
    pub fn completes_turn(&self) -> bool {
        self.is_final && !self.text.is_empty()
    }
}

pub type ResponseStream<'a> = Pin<Box<dyn Stream<Item = Result<ResponseEvent>> + Send + 'a>>;

/// An LLM agent that can run one turn of a session.
///
/// The returned stream is single-pass; callers must not expect to replay it.
pub trait ReasoningBackend: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Submit `text` as the next user turn of `session` and stream the reply.
    fn run_turn(&self, session: Session, text: String) -> ResponseStream<'_>;
}
