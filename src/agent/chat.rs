//! Conversations with an agent persona.

use crate::agent::persona::chat_prompt;
use crate::llm::{GenerationRequest, TextGenerator, CHAT_TEMPERATURE};
use crate::state::AgentStore;
use crate::types::{clean_handle, ChatMessage};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct AgentChat {
    store: Arc<dyn AgentStore>,
    llm: Arc<dyn TextGenerator>,
}

impl AgentChat {
    pub fn new(store: Arc<dyn AgentStore>, llm: Arc<dyn TextGenerator>) -> Self {
        Self { store, llm }
    }

    /// Answer `message` as `handle`, given the earlier turns in `history`.
    ///
    /// Character agents answer with their stored system prompt.
    pub async fn reply(&self, handle: &str, history: &[ChatMessage], message: &str) -> Result<String> {
        if message.trim().is_empty() {
            bail!("Message is empty");
        }
        let handle = clean_handle(handle);

        let system_prompt = match self.store.get_general_agent(&handle).await? {
            Some(character) => character.system_prompt,
            None => {
                let agent = self
                    .store
                    .get_agent(&handle)
                    .await?
                    .with_context(|| format!("Agent {handle} not found"))?;
                chat_prompt(&agent)
            }
        };

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(message));
        debug!("Chat with {} ({} prior turns)", handle, history.len());

        let request = GenerationRequest::chat(system_prompt, messages, CHAT_TEMPERATURE).use_case("agent-chat");
        self.llm
            .generate(&request)
            .await
            .with_context(|| format!("Failed to generate reply from {handle}"))
    }
}
