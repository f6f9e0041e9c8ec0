//! Webhook gateway: receives Telegram updates over HTTP, runs one reasoning
//! turn per message and relays the answer back to the chat.
//!
//! The HTTP layer acknowledges every update immediately; processing happens
//! on a tracked background task so that shutdown can wait for in-flight turns.

pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod state;

pub use {
    dispatcher::{APOLOGY_TEXT, AckStatus, WebhookDispatcher},
    error::{Error, Result},
    lifecycle::Lifecycle,
    server::{build_app, start_gateway},
    state::AppState,
};
