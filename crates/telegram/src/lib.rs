//! Telegram Bot API transport for courier.
//!
//! Classifies webhook updates (decoded with teloxide's wire types) into
//! strictly typed [`InboundEvent`]s and sends replies / manages webhook
//! registration through [`TelegramClient`].

pub mod chunk;
pub mod client;
pub mod error;
pub mod event;
pub mod outbound;

pub use {
    client::{TelegramClient, WebhookStatus},
    error::{Error, Result},
    event::InboundEvent,
    outbound::ChannelOutbound,
    teloxide::{ApiError, RequestError},
};
