// ── Runtime site and engine configuration ──
//
// These types describe *which* sites to visit and *how* the engine paces
// itself. They carry credential data but never touch disk; the config
// crate builds them and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use ptinvitee_api::{SessionAuth, TransportConfig};

/// How a site session authenticates.
#[derive(Debug, Clone, Default)]
pub enum SiteAuth {
    /// Browser cookie string (NexusPHP-style sites).
    Cookie(SecretString),
    /// Token pair for sites with an API front-end.
    ApiToken {
        api_key: SecretString,
        authorization: SecretString,
    },
    /// Nothing configured.
    #[default]
    None,
}

impl SiteAuth {
    fn is_blank(secret: &SecretString) -> bool {
        secret.expose_secret().trim().is_empty()
    }

    pub fn has_cookie(&self) -> bool {
        matches!(self, Self::Cookie(c) if !Self::is_blank(c))
    }

    pub fn has_api_token(&self) -> bool {
        matches!(
            self,
            Self::ApiToken { api_key, authorization }
                if !Self::is_blank(api_key) && !Self::is_blank(authorization)
        )
    }
}

/// One configured site. Immutable for the duration of a refresh.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Unique key; also the key in the data store.
    pub name: String,
    /// Site base URL.
    pub url: Url,
    pub auth: SiteAuth,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub enabled: bool,
}

impl SiteConfig {
    pub fn new(name: impl Into<String>, url: Url, auth: SiteAuth) -> Self {
        Self {
            name: name.into(),
            url,
            auth,
            user_agent: None,
            proxy: None,
            enabled: true,
        }
    }

    /// Which credential is missing for a handler that needs `requirement`.
    pub fn missing_credentials(&self, requirement: CredentialKind) -> Option<&'static str> {
        match requirement {
            CredentialKind::Cookie if !self.auth.has_cookie() => Some("cookie"),
            CredentialKind::ApiToken if !self.auth.has_api_token() => {
                Some("api_key and authorization")
            }
            _ => None,
        }
    }

    /// Transport settings for this site under the given engine limits.
    pub fn transport(&self, engine: &EngineConfig) -> TransportConfig {
        let auth = match &self.auth {
            SiteAuth::Cookie(c) => SessionAuth::Cookie(c.clone()),
            SiteAuth::ApiToken {
                api_key,
                authorization,
            } => SessionAuth::ApiToken {
                api_key: api_key.clone(),
                authorization: authorization.clone(),
            },
            SiteAuth::None => SessionAuth::None,
        };
        let mut transport = TransportConfig {
            connect_timeout: engine.connect_timeout,
            timeout: engine.read_timeout,
            proxy: self.proxy.clone(),
            auth,
            ..TransportConfig::default()
        };
        if let Some(ref ua) = self.user_agent {
            transport.user_agent.clone_from(ua);
        }
        transport
    }
}

/// The credential a site family needs before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Cookie,
    ApiToken,
}

/// Pagination limits shared by every paged handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterLimits {
    /// A page shorter than this is the last one.
    pub page_size: usize,
    /// Hard cap on pages fetched per site (first page included).
    pub max_pages: usize,
    /// Pause between page requests.
    pub page_delay: Duration,
}

impl Default for RosterLimits {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 100,
            page_delay: Duration::ZERO,
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding `site_data.json` and `last_run.json`.
    pub data_dir: PathBuf,
    pub roster: RosterLimits,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Periodic refresh interval. Zero disables periodic mode.
    pub refresh_interval: Duration,
    /// Age after which stored data counts as stale.
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            roster: RosterLimits::default(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(6 * 60 * 60),
            cache_ttl: Duration::from_secs(6 * 60 * 60),
        }
    }
}
