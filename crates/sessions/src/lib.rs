//! Conversation sessions.
//!
//! A [`Session`] is the reasoning backend's per-user state: its key and the
//! conversation history. Sessions live in memory only and are lost on
//! restart. [`InMemorySessionStore`] maps each identity to exactly one
//! session, creating it on first use.

pub mod error;
pub mod key;
pub mod message;
pub mod session;
pub mod store;

pub use {
    error::{Error, Result},
    key::SessionKey,
    message::{Content, Role},
    session::Session,
    store::{InMemorySessionStore, SessionLimits, SessionStore},
};
