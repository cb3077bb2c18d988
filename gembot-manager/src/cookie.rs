//! Signed session cookies
//!
//! The cookie value is `<session id>.<base64url HMAC-SHA256 of the id>`, so a
//! client cannot pick another user's session id.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::header::{HeaderName, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use gembot_core::config::is_cookie_name;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Session id resolved for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSession {
    pub id: String,
    /// True when the id was minted for this request and must be sent back
    pub is_new: bool,
}

pub struct SessionCookies {
    name: String,
    mac: HmacSha256,
}

impl SessionCookies {
    /// Build a signer. Without a secret a random key is generated, so cookies
    /// only stay valid for the life of the process.
    pub fn new(name: impl Into<String>, secret: Option<&str>) -> anyhow::Result<Self> {
        let name = name.into();
        if !is_cookie_name(&name) {
            anyhow::bail!("invalid session cookie name {:?}", name);
        }

        let key = match secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                warn!("No server.secret_key configured; using a random per-process cookie key");
                let mut key = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                key
            }
        };
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("invalid cookie signing key: {}", e))?;

        Ok(Self { name, mac })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the cookie value for `id`
    pub fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{}.{}", id, B64.encode(tag))
    }

    /// Return the session id if `value` carries a valid signature
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, tag) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let tag = B64.decode(tag).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&tag).ok()?;
        Some(id.to_string())
    }

    /// Find and verify our cookie among the request's `Cookie` headers
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.name)
            .find_map(|(_, value)| self.verify(value))
    }

    /// The request's session, or a freshly minted one
    pub fn resolve(&self, headers: &HeaderMap) -> CookieSession {
        match self.session_id(headers) {
            Some(id) => CookieSession { id, is_new: false },
            None => CookieSession {
                id: uuid::Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    /// `Set-Cookie` header assigning `id`
    pub fn set_cookie(
        &self,
        id: &str,
    ) -> Result<(HeaderName, HeaderValue), InvalidHeaderValue> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.name,
            self.sign(id)
        );
        Ok((SET_COOKIE, HeaderValue::from_str(&cookie)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies() -> SessionCookies {
        SessionCookies::new("session", Some("test-secret")).unwrap()
    }

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_sign_then_verify() {
        let cookies = cookies();
        let value = cookies.sign("abc-123");
        assert!(value.starts_with("abc-123."));
        assert_eq!(cookies.verify(&value).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_tampered_values_are_rejected() {
        let cookies = cookies();
        let value = cookies.sign("abc");
        let forged = value.replacen("abc", "abd", 1);

        assert_eq!(cookies.verify(&forged), None);
        assert_eq!(cookies.verify("abc"), None);
        assert_eq!(cookies.verify("abc.!!!"), None);
        assert_eq!(cookies.verify(".tag"), None);
    }

    #[test]
    fn test_other_key_does_not_verify() {
        let value = cookies().sign("abc");
        let other = SessionCookies::new("session", Some("different")).unwrap();
        assert_eq!(other.verify(&value), None);
    }

    #[test]
    fn test_resolve_reads_named_cookie() {
        let cookies = cookies();
        let header = format!("theme=dark; session={}", cookies.sign("sid-1"));

        let session = cookies.resolve(&headers_with(&header));
        assert_eq!(
            session,
            CookieSession {
                id: "sid-1".to_string(),
                is_new: false
            }
        );
    }

    #[test]
    fn test_resolve_mints_id_for_bad_cookie() {
        let cookies = cookies();
        let session = cookies.resolve(&headers_with("session=forged.AAAA"));
        assert!(session.is_new);
        assert!(uuid::Uuid::parse_str(&session.id).is_ok());

        let fresh = cookies.resolve(&HeaderMap::new());
        assert!(fresh.is_new);
        assert_ne!(fresh.id, session.id);
    }

    #[test]
    fn test_set_cookie_round_trips_through_resolve() {
        let cookies = cookies();
        let (name, value) = cookies.set_cookie("sid-9").unwrap();
        assert_eq!(name, SET_COOKIE);

        let raw = value.to_str().unwrap();
        assert!(raw.contains("HttpOnly"));
        let pair = raw.split(';').next().unwrap();
        assert_eq!(cookies.resolve(&headers_with(pair)).id, "sid-9");
    }

    #[test]
    fn test_rejects_names_that_are_not_cookie_tokens() {
        for name in ["", "my session", "a;b", "sess=ion"] {
            assert!(SessionCookies::new(name, Some("k")).is_err(), "{:?}", name);
        }
        assert!(SessionCookies::new("gembot_sid", None).is_ok());
    }

    #[test]
    fn test_set_cookie_uses_configured_name() {
        let cookies = SessionCookies::new("gembot_sid", Some("k")).unwrap();
        let (_, value) = cookies.set_cookie("sid-1").unwrap();
        assert!(value.to_str().unwrap().starts_with("gembot_sid=sid-1."));

        assert!(cookies.set_cookie("bad\nid").is_err());
    }
}
