//! Generative model provider integrations for gembot
//!
//! The rest of the workspace only sees [`LLMProvider`] and [`ChatSession`];
//! [`GeminiClient`] is the concrete backend.

pub mod base;
pub mod chat;
pub mod gemini;

pub use base::{LLMProvider, LLMResponse, Message, MessageRole, ProviderError, ProviderResult};
pub use chat::ChatSession;
pub use gemini::GeminiClient;
