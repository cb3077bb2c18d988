use gembot_core::config::Config;
use gembot_core::session::SessionLimits;
use gembot_providers::LLMProvider;
use std::sync::Arc;

use crate::cookie::SessionCookies;
use crate::manager::Manager;

/// Header carrying the session id for API clients
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub cookies: Arc<SessionCookies>,
}

impl AppState {
    pub fn new(manager: Arc<Manager>, cookies: SessionCookies) -> Self {
        Self {
            manager,
            cookies: Arc::new(cookies),
        }
    }

    /// Wire a manager and cookie signer from configuration
    pub fn from_config(config: &Config, provider: Arc<dyn LLMProvider>) -> anyhow::Result<Self> {
        let manager = Manager::new(
            provider,
            SessionLimits::from(&config.sessions),
            config.server.max_message_chars,
        );
        let cookies = SessionCookies::new(
            config.server.cookie_name.clone(),
            config.server.secret_key.as_deref(),
        )?;
        Ok(Self::new(Arc::new(manager), cookies))
    }
}
