use {courier_common::ConversationIdentity, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create session for {identity}: {reason}")]
    CreateFailed {
        identity: ConversationIdentity,
        reason: String,
    },
}

impl Error {
    #[must_use]
    pub fn create_failed(identity: &ConversationIdentity, reason: impl Into<String>) -> Self {
        Self::CreateFailed {
            identity: identity.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
