//! Text generation backends.

pub mod gemini;

pub use gemini::GeminiClient;

use crate::types::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;

/// Temperature for analysis prompts (personality, goals, skills).
pub const ANALYSIS_TEMPERATURE: f64 = 0.2;
/// Temperature for persona chat.
pub const CHAT_TEMPERATURE: f64 = 0.7;

/// One generation call: optional system instruction plus a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    /// Route to the reasoning model instead of the default one.
    pub thinking: bool,
    /// Short label used in logs.
    pub use_case: String,
}

impl GenerationRequest {
    /// Single user prompt without a system instruction.
    pub fn prompt(text: impl Into<String>, temperature: f64) -> Self {
        Self {
            system_prompt: None,
            messages: vec![ChatMessage::user(text)],
            temperature,
            thinking: false,
            use_case: "default".into(),
        }
    }

    /// Conversation under a system instruction.
    pub fn chat(system_prompt: impl Into<String>, messages: Vec<ChatMessage>, temperature: f64) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            messages,
            temperature,
            thinking: false,
            use_case: "chat".into(),
        }
    }

    pub fn use_case(mut self, label: impl Into<String>) -> Self {
        self.use_case = label.into();
        self
    }

    pub fn thinking(mut self) -> Self {
        self.thinking = true;
        self
    }
}

/// A model that turns a [`GenerationRequest`] into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
