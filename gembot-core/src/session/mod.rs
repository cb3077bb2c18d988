//! Session management for conversation history
//!
//! Sessions live in process memory only. Each one pairs a model-side
//! conversation handle with the turns exchanged through it.

pub mod manager;
pub mod store;

pub use manager::{SessionHandle, SessionLimits, SessionStore};
pub use store::{Role, Session, Turn};
