use std::{sync::Arc, time::Duration};

use {
    courier_sessions::Session,
    futures::StreamExt,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    model::{ReasoningBackend, ResponseStream},
};

pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs conversational turns against a [`ReasoningBackend`].
///
/// Each call to [`Runner::converse`] consumes the backend stream exactly once
/// and never retries.
#[derive(Clone)]
pub struct Runner {
    backend: Arc<dyn ReasoningBackend>,
    turn_timeout: Duration,
}

impl Runner {
    /// A zero `turn_timeout` falls back to [`DEFAULT_TURN_TIMEOUT`].
    pub fn new(backend: Arc<dyn ReasoningBackend>, turn_timeout: Duration) -> Self {
        let turn_timeout = if turn_timeout.is_zero() {
            DEFAULT_TURN_TIMEOUT
        } else {
            turn_timeout
        };
        Self {
            backend,
            turn_timeout,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Send `text` as a new turn of `session` and return the final answer.
    pub async fn converse(&self, session: &Session, text: &str) -> Result<String> {
        let identity = session.identity().clone();
        debug!(
            backend = self.backend.name(),
            identity = %identity,
            "starting turn"
        );

        let stream = self.backend.run_turn(session.clone(), text.to_string());
        let answer = match tokio::time::timeout(self.turn_timeout, final_text(stream)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(identity = %identity, timeout_secs = self.turn_timeout.as_secs(), "turn timed out");
                return Err(Error::reasoning_failed(format!(
                    "turn timed out after {}s",
                    self.turn_timeout.as_secs()
                )));
            },
        };

        info!(identity = %identity, answer_len = answer.len(), "turn complete");
        Ok(answer)
    }
}

/// Reduce a response stream to the text of its first final, non-empty event.
///
/// Earlier events are discarded and anything after the selected event is not
/// polled. A stream error ends the turn with that error.
pub async fn final_text(mut stream: ResponseStream<'_>) -> Result<String> {
    let mut discarded = 0usize;
    while let Some(event) = stream.next().await {
        let event = event?;
        if event.completes_turn() {
            debug!(
                author = %event.author,
                finish_reason = ?event.finish_reason,
                discarded,
                "final response received"
            );
            return Ok(event.text);
        }
        discarded += 1;
    }
    Err(Error::no_final_response())
}
