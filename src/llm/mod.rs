//! Chat-completion providers used for answer generation.

use anyhow::Result;

mod anthropic;
mod groq;

pub use anthropic::AnthropicProvider;
pub use groq::GroqProvider;

/// Prompt envelope shared by the concrete providers.
pub struct ChatRequest<'a> {
    /// Fully rendered prompt text.
    pub prompt: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens requested from the completion model.
    pub max_tokens: usize,
}

/// Trait implemented by concrete chat-LLM providers.
pub trait ChatProvider: Send + Sync {
    /// Sends the prompt and returns the model's text response verbatim.
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}
