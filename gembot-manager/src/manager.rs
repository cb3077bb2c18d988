use gembot_core::session::{SessionLimits, SessionStore, Turn};
use gembot_providers::{ChatSession, LLMProvider};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::ChatError;

pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I couldn't generate a response at the moment.";
pub const ERROR_REPLY_FALLBACK: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";
pub const CLEARED_MESSAGE: &str = "Conversation history cleared.";

/// Why a canned reply was sent instead of generated text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    EmptyResponse,
    ProviderError,
}

/// What the user gets back from an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Generated(String),
    Fallback {
        text: &'static str,
        reason: FallbackReason,
    },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Generated(text) => text.as_str(),
            Reply::Fallback { text, .. } => *text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback { .. })
    }
}

/// A validated user message and the reply to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// The user's message after trimming
    pub message: String,
    pub reply: Reply,
}

/// Runs chat exchanges against the model provider, one conversation per session
pub struct Manager {
    provider: Arc<dyn LLMProvider>,
    sessions: SessionStore<ChatSession>,
    max_message_chars: usize,
}

impl Manager {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        limits: SessionLimits,
        max_message_chars: usize,
    ) -> Self {
        Self {
            provider,
            sessions: SessionStore::with_limits(limits),
            max_message_chars,
        }
    }

    /// Check a raw message and return it trimmed
    pub fn validate_message(&self, raw: Option<&str>) -> Result<String, ChatError> {
        let Some(raw) = raw else {
            return Err(ChatError::Validation("No message provided".to_string()));
        };

        let message = raw.trim();
        if message.is_empty() {
            return Err(ChatError::Validation("Empty message".to_string()));
        }
        if message.chars().count() > self.max_message_chars {
            return Err(ChatError::Validation(format!(
                "Message too long. Please keep it under {} characters.",
                group_thousands(self.max_message_chars)
            )));
        }

        Ok(message.to_string())
    }

    /// Validate `raw` and run one exchange for `session_id`.
    ///
    /// The exchange runs on its own task: it completes even if the client
    /// goes away, and a panic inside it surfaces as [`ChatError::Internal`].
    pub async fn chat(
        self: &Arc<Self>,
        session_id: &str,
        raw: Option<&str>,
    ) -> Result<Exchange, ChatError> {
        let message = self.validate_message(raw)?;

        let manager = Arc::clone(self);
        let session_id = session_id.to_string();
        let task_message = message.clone();
        let reply = tokio::spawn(async move {
            manager.generate_response(&session_id, &task_message).await
        })
        .await
        .map_err(|e| ChatError::Internal(format!("exchange task failed: {}", e)))?;

        Ok(Exchange { message, reply })
    }

    /// Send `message` in the session's conversation and record the turn pair.
    ///
    /// Provider failures never escape: they are logged and replaced by a
    /// fixed fallback reply, and the history is left as it was.
    pub async fn generate_response(&self, session_id: &str, message: &str) -> Reply {
        let handle = self
            .sessions
            .get_or_create(session_id, || ChatSession::new(self.provider.clone()));
        let mut session = handle.lock().await;

        debug!(
            "Generating response for session {} ({} prior exchanges)",
            session_id,
            session.exchange_count()
        );

        match session.conversation.send_message(message).await {
            Ok(response) => match response.reply() {
                Some(text) => {
                    let text = text.to_string();
                    session.record_exchange(message, text.as_str());
                    Reply::Generated(text)
                }
                None => {
                    warn!("Empty response from model for session {}", session_id);
                    Reply::Fallback {
                        text: EMPTY_REPLY_FALLBACK,
                        reason: FallbackReason::EmptyResponse,
                    }
                }
            },
            Err(e) => {
                error!("Error generating response: {}", e);
                Reply::Fallback {
                    text: ERROR_REPLY_FALLBACK,
                    reason: FallbackReason::ProviderError,
                }
            }
        }
    }

    /// Forget a session entirely
    pub fn clear(&self, session_id: &str) -> &'static str {
        if self.sessions.clear(session_id) {
            info!("Cleared conversation for session {}", session_id);
        }
        CLEARED_MESSAGE
    }

    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions.get_history(session_id).await
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }

    pub fn sessions(&self) -> &SessionStore<ChatSession> {
        &self.sessions
    }

    pub fn model(&self) -> String {
        self.provider.default_model()
    }
}

/// 10000 -> "10,000"
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
