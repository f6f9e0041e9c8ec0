//! Reasoning gateway: drives an LLM backend through one conversational turn
//! and reduces its streamed response to a single answer.

pub mod error;
pub mod model;
pub mod providers;
pub mod runner;

pub use {
    error::{Error, Result},
    model::{ReasoningBackend, ResponseEvent, ResponseStream},
    providers::gemini::GeminiBackend,
    runner::Runner,
};
