// Shared transport configuration for building reqwest::Client instances.
//
// Every site session goes through this module so timeout, proxy, and
// credential header handling live in one place.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Default browser-like user agent; many trackers reject obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Credentials attached to every request of a session.
#[derive(Debug, Clone, Default)]
pub enum SessionAuth {
    /// Raw `Cookie` header value copied from a logged-in browser.
    Cookie(SecretString),
    /// Token pair sent as `API-Key` and `Authorization` headers.
    ApiToken {
        api_key: SecretString,
        authorization: SecretString,
    },
    /// No credentials.
    #[default]
    None,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout (connect + read).
    pub timeout: Duration,
    pub user_agent: String,
    /// Optional proxy URL (`http://`, `https://` or `socks5://`).
    pub proxy: Option<String>,
    pub auth: SessionAuth,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.into(),
            proxy: None,
            auth: SessionAuth::None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Credentials become default headers so every request made through the
    /// client carries them, including redirects within the same site.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .default_headers(self.auth_headers()?);

        if let Some(ref proxy) = self.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::ClientBuild(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        match &self.auth {
            SessionAuth::Cookie(cookie) => {
                headers.insert(COOKIE, sensitive_value(cookie, "cookie")?);
            }
            SessionAuth::ApiToken {
                api_key,
                authorization,
            } => {
                headers.insert(
                    HeaderName::from_static("api-key"),
                    sensitive_value(api_key, "api_key")?,
                );
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    sensitive_value(authorization, "authorization")?,
                );
            }
            SessionAuth::None => {}
        }
        Ok(headers)
    }
}

fn sensitive_value(secret: &SecretString, what: &str) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(secret.expose_secret().trim())
        .map_err(|_| Error::ClientBuild(format!("{what} contains characters not allowed in a header")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_is_marked_sensitive() {
        let config = TransportConfig {
            auth: SessionAuth::Cookie(SecretString::from("uid=1; pass=abc ")),
            ..TransportConfig::default()
        };
        let headers = config.auth_headers().unwrap();
        let cookie = headers.get(COOKIE).unwrap();
        assert_eq!(cookie.to_str().unwrap(), "uid=1; pass=abc");
        assert!(cookie.is_sensitive());
    }

    #[test]
    fn token_pair_sets_both_headers() {
        let config = TransportConfig {
            auth: SessionAuth::ApiToken {
                api_key: SecretString::from("k"),
                authorization: SecretString::from("Bearer t"),
            },
            ..TransportConfig::default()
        };
        let headers = config.auth_headers().unwrap();
        assert_eq!(headers.get("api-key").unwrap(), "k");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer t");
    }

    #[test]
    fn newline_in_cookie_is_rejected() {
        let config = TransportConfig {
            auth: SessionAuth::Cookie(SecretString::from("a=1\nb=2")),
            ..TransportConfig::default()
        };
        assert!(matches!(config.build_client(), Err(Error::ClientBuild(_))));
    }

    #[test]
    fn bad_proxy_is_a_build_error() {
        let config = TransportConfig {
            proxy: Some("not a url".into()),
            ..TransportConfig::default()
        };
        assert!(matches!(config.build_client(), Err(Error::ClientBuild(_))));
    }
}
