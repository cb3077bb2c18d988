//! Core types and traits for gembot
//!
//! This crate provides the configuration, logging setup, error type and the
//! session store shared by the other gembot components.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use error::{Error, Result};
