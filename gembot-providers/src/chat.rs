//! Conversation handles

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::base::{LLMProvider, LLMResponse, Message, ProviderResult};

/// A multi-turn conversation with a provider.
///
/// Keeps the provider-side message list and replays it on every request so
/// stateless APIs see the whole context.
pub struct ChatSession {
    provider: Arc<dyn LLMProvider>,
    history: Vec<Message>,
}

impl ChatSession {
    /// Start an empty conversation
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            history: Vec::new(),
        }
    }

    /// Send a message in the context of this conversation.
    ///
    /// The exchange is only remembered when the provider returned text.
    pub async fn send_message(&mut self, message: &str) -> ProviderResult<LLMResponse> {
        let response = self.provider.generate(&self.history, message).await?;

        if let Some(reply) = response.reply() {
            self.history.push(Message::user(message));
            self.history.push(Message::model(reply));
        } else {
            debug!("Provider returned no text; conversation context unchanged");
        }

        Ok(response)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("model", &self.provider.default_model())
            .field("messages", &self.history.len())
            .finish()
    }
}
