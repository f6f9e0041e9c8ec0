use std::{sync::Arc, time::Duration};

use {
    courier_agents::Runner,
    courier_common::{ChatId, ConversationIdentity},
    courier_sessions::SessionStore,
    courier_telegram::{ChannelOutbound, InboundEvent},
    tokio_util::task::TaskTracker,
    tracing::{Instrument, debug, error, info, info_span, warn},
};

use crate::error::{Error, Result};

/// Reply sent when a turn fails for any internal reason.
pub const APOLOGY_TEXT: &str = "Sorry, an internal error occurred while processing your request.";

/// Outcome of receiving one update. Both variants are acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Classified and handed to processing.
    Accepted,
    /// Malformed; logged and dropped without a reply.
    Ignored,
}

/// Routes inbound updates through session resolution, the reasoning turn and
/// the reply.
///
/// Every per-event error is contained here: it becomes an apology reply or a
/// log line, never a failure of the webhook call.
pub struct WebhookDispatcher {
    sessions: Arc<dyn SessionStore>,
    runner: Runner,
    outbound: Arc<dyn ChannelOutbound>,
    tracker: TaskTracker,
}

impl WebhookDispatcher {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        runner: Runner,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Self {
        Self {
            sessions,
            runner,
            outbound,
            tracker: TaskTracker::new(),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Classify `raw` and process it on a tracked background task.
    ///
    /// Returns as soon as the update is classified; the reply is sent later.
    pub fn accept(self: &Arc<Self>, raw: &[u8]) -> AckStatus {
        let Some((update_id, event)) = classify(raw) else {
            return AckStatus::Ignored;
        };
        let this = Arc::clone(self);
        let span = info_span!("update", update_id, kind = event.kind());
        self.tracker
            .spawn(async move { this.dispatch(event).await }.instrument(span));
        AckStatus::Accepted
    }

    /// Classify and fully process `raw` before returning.
    pub async fn handle(&self, raw: &[u8]) -> AckStatus {
        let Some((update_id, event)) = classify(raw) else {
            return AckStatus::Ignored;
        };
        let span = info_span!("update", update_id, kind = event.kind());
        self.dispatch(event).instrument(span).await;
        AckStatus::Accepted
    }

    /// Process one event, logging the outcome.
    async fn dispatch(&self, event: InboundEvent) {
        if let Err(e) = self.process(event).await {
            warn!(error = %e, "update handling failed");
        }
    }

    /// Process one classified event.
    ///
    /// Exactly one reply is attempted. The returned error is for logging only;
    /// the user has already been answered (or the reply failed).
    pub async fn process(&self, event: InboundEvent) -> Result<()> {
        let chat_id = event.reply_chat_id();
        match event {
            InboundEvent::TextMessage {
                sender_id,
                text,
                message_id,
                ..
            } => {
                let identity = ConversationIdentity::from_sender(sender_id);
                debug!(chat_id, identity = %identity, message_id, "text message");
                self.handle_text(chat_id, &identity, &text).await
            },
            InboundEvent::CallbackQuery { query_id, data, .. } => {
                debug!(chat_id, query_id = %query_id, "callback query");
                self.handle_callback(chat_id, &query_id, &data).await
            },
        }
    }

    async fn handle_text(
        &self,
        chat_id: ChatId,
        identity: &ConversationIdentity,
        text: &str,
    ) -> Result<()> {
        match self.answer(identity, text).await {
            Ok(answer) => {
                self.outbound
                    .send_text(chat_id, &answer)
                    .await
                    .map_err(|e| {
                        error!(chat_id, identity = %identity, error = %e, "failed to deliver answer");
                        Error::Transport(e)
                    })?;
                info!(chat_id, identity = %identity, "answer delivered");
                Ok(())
            },
            Err(e) => {
                error!(chat_id, identity = %identity, error = %e, "turn failed, sending apology");
                if let Err(send_err) = self.outbound.send_text(chat_id, APOLOGY_TEXT).await {
                    warn!(chat_id, error = %send_err, "failed to deliver apology");
                }
                Err(e)
            },
        }
    }

    async fn answer(&self, identity: &ConversationIdentity, text: &str) -> Result<String> {
        let session = self.sessions.resolve(identity).await.map_err(|source| {
            Error::SessionCreateFailed {
                identity: identity.clone(),
                source,
            }
        })?;
        Ok(self.runner.converse(&session, text).await?)
    }

    async fn handle_callback(&self, chat_id: ChatId, query_id: &str, data: &str) -> Result<()> {
        let reply = format!("Received callback: {data}");
        let sent = self.outbound.send_text(chat_id, &reply).await;

        if let Err(e) = self.outbound.acknowledge_callback(query_id).await {
            debug!(query_id, error = %e, "answerCallbackQuery failed");
        }

        sent.map_err(|e| {
            error!(chat_id, error = %e, "failed to deliver callback acknowledgement");
            Error::Transport(e)
        })
    }

    /// Number of turns still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop tracking new work and wait up to `grace` for in-flight turns.
    ///
    /// Returns `false` when the grace period ran out first.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "waiting for in-flight turns");
        }
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            true
        } else {
            warn!(
                abandoned = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "grace period elapsed with turns still running"
            );
            false
        }
    }
}

fn classify(raw: &[u8]) -> Option<(i64, InboundEvent)> {
    match InboundEvent::parse(raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(error = %e, body_len = raw.len(), "ignoring malformed update");
            None
        },
    }
}
