use crate::error::DroveError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

/// Authentication scheme applied to every outbound controller request.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        user: String,
        pass: String,
    },
    Bearer {
        token: String,
    },
}

impl AuthConfig {
    pub fn basic(user: String, pass: String) -> Self {
        Self::Basic { user, pass }
    }

    pub fn bearer(token: String) -> Self {
        Self::Bearer { token }
    }

    /// Build the header map applied to every request: `Accept:
    /// application/json` always, plus `Authorization` per scheme. The
    /// bearer token is placed verbatim, never prefixed with `Bearer `.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        match self {
            AuthConfig::None => {}
            AuthConfig::Basic { user, pass } => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
                if let Ok(value) = HeaderValue::from_str(&format!("Basic {encoded}")) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
            AuthConfig::Bearer { token } => {
                if let Ok(value) = HeaderValue::from_str(token) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }
        headers
    }
}

/// Build the shared HTTP client used for every controller request:
/// per-host connection pooling, no client-level timeout (every call carries
/// its own deadline), redirects surfaced to the caller rather than
/// followed, and optional TLS-verify bypass.
pub fn build_client(skip_ssl_check: bool) -> Result<reqwest::Client, DroveError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(skip_ssl_check)
        .build()
        .map_err(DroveError::Transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_not_prefixed() {
        let auth = AuthConfig::bearer("raw-token-value".to_string());
        let headers = auth.headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "raw-token-value");
    }

    #[test]
    fn basic_auth_encodes_user_and_pass() {
        let auth = AuthConfig::basic("user".to_string(), "pass".to_string());
        let headers = auth.headers();
        let value = headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(value.starts_with("Basic "));
    }

    #[test]
    fn no_auth_still_sets_accept_header() {
        let headers = AuthConfig::None.headers();
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert!(headers.get(AUTHORIZATION).is_none());
    }
}
