//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use ptinvitee_config::ConfigError;
use ptinvitee_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Site access ──────────────────────────────────────────────────

    #[error("Could not reach {url}")]
    #[diagnostic(
        code(ptinvitee::connection_failed),
        help("Check the site URL and your network or proxy settings.\nReason: {reason}")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ptinvitee::auth_failed),
        help(
            "The cookie has probably expired. Copy a fresh one from your browser and run:\n\
             ptinvitee config set-cookie <site>"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for site '{site}' (missing {missing})")]
    #[diagnostic(
        code(ptinvitee::no_credentials),
        help(
            "Set `cookie_env` / `cookie` for the site in the config file,\n\
             or store one with: ptinvitee config set-cookie {site}"
        )
    )]
    NoCredentials { site: String, missing: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(ptinvitee::timeout),
        help("Raise engine.read_timeout in the config file or try again later.")
    )]
    Timeout { seconds: u64 },

    #[error("Site returned an error: {message}")]
    #[diagnostic(code(ptinvitee::site_error))]
    SiteError { message: String },

    // ── Refresh ──────────────────────────────────────────────────────

    #[error("{failed} of {total} sites failed to refresh")]
    #[diagnostic(
        code(ptinvitee::refresh_failed),
        help("Failed sites keep their previous data. Run `ptinvitee status` for details.")
    )]
    RefreshFailed { failed: usize, total: usize },

    #[error("A refresh is already running")]
    #[diagnostic(code(ptinvitee::busy))]
    AlreadyRunning,

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(ptinvitee::not_found),
        help("Run: ptinvitee {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ptinvitee::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No sites configured")]
    #[diagnostic(
        code(ptinvitee::no_sites),
        help(
            "Create a config with: ptinvitee config init\n\
             Expected at: {path}"
        )
    )]
    NoSites { path: String },

    #[error(transparent)]
    #[diagnostic(code(ptinvitee::config))]
    Config(Box<ConfigError>),

    // ── Storage / IO ─────────────────────────────────────────────────

    #[error("Data store error: {message}")]
    #[diagnostic(
        code(ptinvitee::storage),
        help("Check engine.data_dir permissions. A corrupt file can be removed to start fresh.")
    )]
    Storage { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownSite(name) => Self::NotFound {
                resource_type: "site".into(),
                identifier: name,
                list_command: "sites list".into(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoSites { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication { message } => CliError::AuthFailed { message },

            CoreError::IncompleteCredentials { site, missing } => {
                CliError::NoCredentials { site, missing }
            }

            CoreError::Transport { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::SiteNotFound { name } => CliError::NotFound {
                resource_type: "site".into(),
                identifier: name,
                list_command: "sites list".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            e @ (CoreError::Storage { .. } | CoreError::CorruptStore { .. }) => {
                CliError::Storage {
                    message: e.to_string(),
                }
            }

            e @ (CoreError::UnexpectedStatus { .. }
            | CoreError::Parse { .. }
            | CoreError::Internal(_)) => CliError::SiteError {
                message: e.to_string(),
            },
        }
    }
}
