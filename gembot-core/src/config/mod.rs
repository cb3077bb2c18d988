//! Configuration management
//!
//! Handles loading and validation of gembot configuration from files
//! and environment variables.

pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::ConfigLoader;
pub use schema::*;
pub use validate::{is_cookie_name, validate_config};
