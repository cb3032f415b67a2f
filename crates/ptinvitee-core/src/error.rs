// ── Core error types ──
//
// Domain-level errors from ptinvitee-core. Consumers never see reqwest
// errors directly; the `From<ptinvitee_api::Error>` impl translates
// transport failures into authentication / transport / timeout variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Site access errors ───────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Incomplete credentials for site '{site}': missing {missing}")]
    IncompleteCredentials { site: String, missing: String },

    #[error("Cannot reach {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Site not found: {name}")]
    SiteNotFound { name: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Storage errors ───────────────────────────────────────────────
    #[error("Storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt data file {path}: {source}")]
    CorruptStore {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the site rejected the session credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::IncompleteCredentials { .. }
        )
    }

    /// Returns `true` for network-level problems (unreachable, timeout, 5xx).
    pub fn is_transport_failure(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ptinvitee_api::Error> for CoreError {
    fn from(err: ptinvitee_api::Error) -> Self {
        match err {
            ptinvitee_api::Error::Authentication { message } => {
                CoreError::Authentication { message }
            }
            ptinvitee_api::Error::LoggedOut { url } => CoreError::Authentication {
                message: format!("not logged in (cookie expired?) while fetching {url}"),
            },
            ptinvitee_api::Error::Status { status, url } => {
                CoreError::UnexpectedStatus { status, url }
            }
            ptinvitee_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::Transport {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                }
            }
            ptinvitee_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ptinvitee_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ptinvitee_api::Error::ClientBuild(message) => CoreError::Config { message },
        }
    }
}
