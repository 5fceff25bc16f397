use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AuthMode;

/// Cached OAuth2 access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    /// `None` when the token endpoint did not report a lifetime.
    expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, lifetime: Option<Duration>, now: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at: lifetime.and_then(|l| now.checked_add(l)),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token slot for one server configuration. The lock is never held across
/// an await, so concurrent requests that both see an expired token each run
/// their own exchange.
#[derive(Debug, Default)]
pub(crate) struct TokenCache {
    slot: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub(crate) fn current(&self, now: Instant) -> Option<String> {
        self.slot
            .lock()
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.value.clone())
    }

    pub(crate) fn store(&self, token: AccessToken) {
        *self.slot.lock() = Some(token);
    }

    pub(crate) fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[derive(Debug, Error)]
pub(crate) enum TokenError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint answered {0}")]
    Status(StatusCode),
    #[error("token response carried no access_token")]
    MissingAccessToken,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Some endpoints send the lifetime as a string or a float.
    #[serde(default)]
    expires_in: Value,
}

/// Lifetime in seconds from an `expires_in` value. Anything that is not a
/// non-negative finite number (or a string holding one) means no expiry.
fn token_lifetime(expires_in: &Value) -> Option<Duration> {
    let secs = match expires_in {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Duration::try_from_secs_f64(secs).ok()
}

pub fn basic_credentials(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Form-encoded client-credentials grant against `token_url`.
pub(crate) async fn exchange_client_credentials(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<AccessToken, TokenError> {
    let response = http
        .post(token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TokenError::Status(status));
    }
    let body: TokenResponse = response.json().await?;
    let value = body.access_token.ok_or(TokenError::MissingAccessToken)?;
    Ok(AccessToken::new(
        value,
        token_lifetime(&body.expires_in),
        Instant::now(),
    ))
}

/// Resolves the `Authorization` header value for one outbound request.
///
/// Client-credentials failures are logged and absorbed: the cache is
/// cleared and the request goes out without a header, leaving the server's
/// answer to report the problem.
pub(crate) async fn authorization(
    http: &reqwest::Client,
    auth: &AuthMode,
    tokens: &TokenCache,
) -> Option<String> {
    match auth {
        AuthMode::None => None,
        AuthMode::Basic { username, password } => Some(basic_credentials(username, password)),
        AuthMode::Bearer { token } => Some(bearer(token)),
        AuthMode::ClientCredentials {
            client_id,
            client_secret,
            token_url,
        } => {
            if let Some(token) = tokens.current(Instant::now()) {
                return Some(bearer(&token));
            }
            debug!(%token_url, "requesting client-credentials token");
            match exchange_client_credentials(http, token_url, client_id, client_secret).await {
                Ok(token) => {
                    let header = bearer(token.value());
                    tokens.store(token);
                    Some(header)
                }
                Err(err) => {
                    warn!(%token_url, error = %err, "error getting OAuth token");
                    tokens.clear();
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic_header_encodes_user_colon_password() {
        assert_eq!(basic_credentials("u", "p"), "Basic dTpw");
        assert_eq!(
            basic_credentials("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn token_without_lifetime_never_expires() {
        let now = Instant::now();
        let token = AccessToken::new("T", None, now);
        assert!(token.is_valid_at(now + Duration::from_secs(86_400 * 365)));
    }

    #[test]
    fn token_is_valid_strictly_before_expiry() {
        let now = Instant::now();
        let token = AccessToken::new("T", Some(Duration::from_secs(60)), now);
        assert!(token.is_valid_at(now));
        assert!(token.is_valid_at(now + Duration::from_secs(59)));
        assert!(!token.is_valid_at(now + Duration::from_secs(60)));
    }

    #[test]
    fn lifetime_accepts_numbers_and_numeric_strings() {
        assert_eq!(token_lifetime(&json!(3600)), Some(Duration::from_secs(3600)));
        assert_eq!(token_lifetime(&json!("3600")), Some(Duration::from_secs(3600)));
        assert_eq!(token_lifetime(&json!(" 90 ")), Some(Duration::from_secs(90)));
        assert_eq!(token_lifetime(&json!(1.5)), Some(Duration::from_millis(1500)));
        assert_eq!(token_lifetime(&json!(0)), Some(Duration::ZERO));
    }

    #[test]
    fn unreadable_lifetime_means_no_expiry() {
        assert_eq!(token_lifetime(&Value::Null), None);
        assert_eq!(token_lifetime(&json!("soon")), None);
        assert_eq!(token_lifetime(&json!(-5)), None);
        assert_eq!(token_lifetime(&json!({"seconds": 10})), None);
    }

    #[test]
    fn cache_hides_expired_tokens() {
        let now = Instant::now();
        let cache = TokenCache::default();
        assert_eq!(cache.current(now), None);
        cache.store(AccessToken::new("T", Some(Duration::from_secs(10)), now));
        assert_eq!(cache.current(now).as_deref(), Some("T"));
        assert_eq!(cache.current(now + Duration::from_secs(11)), None);
        cache.clear();
        assert_eq!(cache.current(now), None);
    }

    #[tokio::test]
    async fn static_modes_need_no_network() {
        let http = reqwest::Client::new();
        let tokens = TokenCache::default();
        assert_eq!(authorization(&http, &AuthMode::None, &tokens).await, None);
        let bearer_mode = AuthMode::Bearer { token: "abc".into() };
        assert_eq!(
            authorization(&http, &bearer_mode, &tokens).await.as_deref(),
            Some("Bearer abc")
        );
    }
}
