// Site-scoped HTTP session
//
// Wraps `reqwest::Client` with base-URL-relative path resolution and the
// checks every authenticated page fetch needs: status handling, logged-out
// detection, and timeout classification.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Markers that only appear on a NexusPHP-style login form.
const LOGIN_MARKERS: &[&str] = &["takelogin.php", "action=\"login.php\""];

/// A fetched page: final URL after redirects, status and decoded body.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub url: Url,
    pub body: String,
}

impl Page {
    /// Heuristic check for a login page served in place of the real one.
    pub fn is_login_page(&self) -> bool {
        let path = self.url.path();
        if path.ends_with("login.php") || path.ends_with("/login") {
            return true;
        }
        LOGIN_MARKERS.iter().any(|m| self.body.contains(m))
    }
}

/// HTTP session bound to one site's base URL.
#[derive(Debug, Clone)]
pub struct SiteSession {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl SiteSession {
    /// Create a session from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            timeout: transport.timeout,
        })
    }

    /// Create a session with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            timeout: Duration::from_secs(30),
        }
    }

    /// The site base URL (always ends in `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a site-relative path (`invite.php?id=1`) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET an authenticated page.
    ///
    /// Fails on 4xx/5xx, on timeouts, and when the site answers with its
    /// login page instead of the requested one.
    pub async fn get(&self, path: &str) -> Result<Page, Error> {
        self.get_with_timeout(path, self.timeout).await
    }

    /// GET with a per-request timeout override.
    pub async fn get_with_timeout(&self, path: &str, timeout: Duration) -> Result<Page, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = resp.status();
        let final_url = resp.url().clone();

        if matches!(status.as_u16(), 401 | 403) {
            return Err(Error::Authentication {
                message: format!("HTTP {} from {url}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await.map_err(|e| classify(e, timeout))?;
        let page = Page {
            status: status.as_u16(),
            url: final_url,
            body,
        };

        if page.is_login_page() {
            return Err(Error::LoggedOut {
                url: url.to_string(),
            });
        }

        Ok(page)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(err)
    }
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
