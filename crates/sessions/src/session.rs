use std::sync::Arc;

use {courier_common::ConversationIdentity, tokio::sync::Mutex};

use crate::{key::SessionKey, message::Content};

/// Handle to one conversation's backend state.
///
/// Clones share the same history; two handles are the same session when
/// [`Session::same_as`] is true.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    key: SessionKey,
    history: Mutex<Vec<Content>>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            inner: Arc::new(Inner {
                key,
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.inner.key
    }

    pub fn identity(&self) -> &ConversationIdentity {
        &self.inner.key.user_id
    }

    /// True when both handles point at the same underlying session.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snapshot of the conversation so far, oldest first.
    pub async fn history(&self) -> Vec<Content> {
        self.inner.history.lock().await.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.inner.history.lock().await.len()
    }

    /// Record a completed turn. Both entries are appended under one lock so
    /// concurrent turns never interleave a user entry with another turn's reply.
    pub async fn record_turn(&self, user: Content, model: Content) {
        let mut history = self.inner.history.lock().await;
        history.push(user);
        history.push(model);
    }
}
