use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Telegram chat identifier (private chats share the user's id).
pub type ChatId = i64;

/// Stable key for one user's conversation, derived from the sender id.
///
/// Used both as the session key and as the identity handed to the reasoning
/// backend. Two events from the same sender always map to the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationIdentity(String);

impl ConversationIdentity {
    /// Derive the identity from a platform-assigned sender id.
    #[must_use]
    pub fn from_sender(sender_id: i64) -> Self {
        Self(sender_id.to_string())
    }

    /// Build an identity from an arbitrary non-empty string (CLI sessions, tests).
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_identity("identity must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single reply delivered back through the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub chat_id: ChatId,
    pub text: String,
}

impl OutboundReply {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}
