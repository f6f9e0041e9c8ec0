use std::{collections::HashMap, time::Duration};

use {
    async_trait::async_trait,
    courier_common::ConversationIdentity,
    tokio::{sync::Mutex, time::Instant},
    tracing::{debug, info},
};

use crate::{error::Result, key::SessionKey, session::Session};

/// Maps conversation identities to sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the session for `identity`, creating it if absent.
    ///
    /// Absence is never an error. Concurrent calls for the same identity all
    /// receive the same session.
    async fn resolve(&self, identity: &ConversationIdentity) -> Result<Session>;

    /// Number of live sessions.
    async fn len(&self) -> usize;
}

/// Optional bounds on the in-memory cache. Zero means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    /// Keep at most this many sessions, evicting the least recently used.
    pub max_sessions: usize,
    /// Drop sessions not resolved for this long.
    pub idle_ttl: Option<Duration>,
}

impl SessionLimits {
    #[must_use]
    pub fn new(max_sessions: usize, idle_ttl_secs: u64) -> Self {
        Self {
            max_sessions,
            idle_ttl: (idle_ttl_secs > 0).then(|| Duration::from_secs(idle_ttl_secs)),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_sessions == 0 && self.idle_ttl.is_none()
    }
}

struct Entry {
    session: Session,
    last_used: Instant,
}

/// Process-local session store.
///
/// Lookup and creation happen under one lock, so two racing `resolve` calls
/// for a new identity create exactly one session.
pub struct InMemorySessionStore {
    app_name: String,
    limits: SessionLimits,
    sessions: Mutex<HashMap<ConversationIdentity, Entry>>,
}

impl InMemorySessionStore {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self::with_limits(app_name, SessionLimits::default())
    }

    pub fn with_limits(app_name: impl Into<String>, limits: SessionLimits) -> Self {
        Self {
            app_name: app_name.into(),
            limits,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    fn prune_idle(sessions: &mut HashMap<ConversationIdentity, Entry>, ttl: Duration, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < ttl);
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "pruned idle sessions");
        }
    }

    fn evict_lru(sessions: &mut HashMap<ConversationIdentity, Entry>, max: usize) {
        while sessions.len() > max {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(identity, _)| identity.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(identity = %oldest, "evicted least recently used session");
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn resolve(&self, identity: &ConversationIdentity) -> Result<Session> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        if let Some(ttl) = self.limits.idle_ttl {
            Self::prune_idle(&mut sessions, ttl, now);
        }

        let session = match sessions.get_mut(identity) {
            Some(entry) => {
                entry.last_used = now;
                entry.session.clone()
            },
            None => {
                let session = Session::new(SessionKey::for_identity(&self.app_name, identity));
                sessions.insert(identity.clone(), Entry {
                    session: session.clone(),
                    last_used: now,
                });
                info!(identity = %identity, total = sessions.len(), "created session");
                session
            },
        };

        if self.limits.max_sessions > 0 {
            Self::evict_lru(&mut sessions, self.limits.max_sessions);
        }
        Ok(session)
    }

    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
