use thiserror::Error;

/// Top-level error type for the `ptinvitee-api` crate.
///
/// Every failure a site fetch can hit: rejected credentials, logged-out
/// pages, HTTP status failures, and transport problems. `ptinvitee-core`
/// maps these into domain-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The site rejected the request outright (401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The site served its login page instead of the requested page.
    #[error("Not logged in: {url} redirected to the login page")]
    LoggedOut { url: String },

    // ── HTTP ────────────────────────────────────────────────────────
    /// Non-success status on an authenticated fetch.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The HTTP client could not be constructed (bad proxy, bad header).
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
