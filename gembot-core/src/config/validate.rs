//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.provider.api_key.trim().is_empty() {
        errors.push(
            "provider.api_key is required (set GEMINI_API_KEY or provider.api_key)".to_string(),
        );
    }
    if config.provider.model.trim().is_empty() {
        errors.push("provider.model must not be empty".to_string());
    }
    if config.provider.max_tokens == 0 {
        errors.push("provider.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.provider.temperature) {
        errors.push("provider.temperature must be in [0.0, 2.0]".to_string());
    }
    if config.provider.timeout_secs == 0 {
        errors.push("provider.timeout_secs must be > 0".to_string());
    }

    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if !is_cookie_name(&config.server.cookie_name) {
        errors.push(format!(
            "server.cookie_name {:?} is not a valid cookie name",
            config.server.cookie_name
        ));
    }
    if config.server.max_message_chars == 0 {
        errors.push("server.max_message_chars must be > 0".to_string());
    }
    if let Some(secret) = &config.server.secret_key {
        if secret.is_empty() {
            errors.push("server.secret_key must not be empty when set".to_string());
        }
    }

    if config.sessions.max_sessions == Some(0) {
        errors.push("sessions.max_sessions must be > 0 when set".to_string());
    }
    if config.sessions.ttl_secs == Some(0) {
        errors.push("sessions.ttl_secs must be > 0 when set".to_string());
    }
    if config.sessions.sweep_interval_secs == 0 {
        errors.push("sessions.sweep_interval_secs must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

/// True when `name` is an RFC 6265 cookie-name token
pub fn is_cookie_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}
