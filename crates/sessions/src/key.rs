use std::fmt;

use {
    courier_common::ConversationIdentity,
    serde::{Deserialize, Serialize},
};

/// `(app_name, user_id, session_id)` triple a backend session is bound to.
///
/// Courier keeps one session per user, so `user_id` and `session_id` are
/// both the conversation identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: ConversationIdentity,
    pub session_id: ConversationIdentity,
}

impl SessionKey {
    #[must_use]
    pub fn for_identity(app_name: impl Into<String>, identity: &ConversationIdentity) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: identity.clone(),
            session_id: identity.clone(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.app_name, self.user_id, self.session_id)
    }
}
