//! AI completion service used to answer "ask assistant" requests.
//!
//! The service boundary is a single call, [`CompletionService::complete`].
//! [`OpenAiCompletion`] implements it against any OpenAI-compatible API.

pub mod error;
pub mod openai;

use async_trait::async_trait;

pub use {
    error::{Error, Result},
    openai::OpenAiCompletion,
};

/// Turns a free-form prompt into a single text answer.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
