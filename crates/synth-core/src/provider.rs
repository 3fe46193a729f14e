//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all chat-completion backends (Groq, NGU,
//! a local OpenAI-compatible server, test fakes) so the reasoning engine works
//! with any of them without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synth_core::provider::{GenerationOptions, LlmProvider};
//!
//! let completion = provider.complete(&messages, &GenerationOptions::default()).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Per-call generation options
///
/// Every field is an override; `None` means "use the profile default".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Profile to route to (e.g. "GROQ"); `None` selects the active profile
    #[serde(default)]
    pub profile: Option<String>,

    /// Model identifier override
    #[serde(default)]
    pub model: Option<String>,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text (first candidate)
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Profile that served the request (filled in by the router)
    #[serde(default)]
    pub profile: Option<String>,

    /// Token usage statistics (if available)
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            profile: None,
            usage: None,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The router and the reasoning engine work exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Profile name this backend was configured under (e.g. "GROQ")
    fn name(&self) -> &str;

    /// Model used when the options carry no override
    fn default_model(&self) -> &str;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Generate a completion from messages
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;
}
