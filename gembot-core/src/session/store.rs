//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One message in a session's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub message: String,
}

impl Turn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            message: message.into(),
        }
    }
}

/// A conversation session.
///
/// `C` is the conversation handle owned by the model service; the session
/// only keeps it alongside the turns exchanged through it.
#[derive(Debug)]
pub struct Session<C> {
    /// Opaque session token
    pub id: String,
    /// Model-side conversation context
    pub conversation: C,
    turns: Vec<Turn>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl<C> Session<C> {
    /// Create an empty session around a fresh conversation
    pub fn new(id: impl Into<String>, conversation: C) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            conversation,
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a user turn and the assistant reply to it
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::user(user));
        self.turns.push(Turn::assistant(assistant));
        self.updated_at = Utc::now();
    }

    /// Turns in chronological order
    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of completed user/assistant exchanges
    pub fn exchange_count(&self) -> usize {
        self.turns.len() / 2
    }
}
