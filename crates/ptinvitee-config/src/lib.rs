//! Configuration for ptinvitee.
//!
//! TOML file plus environment (figment), credential resolution (env var →
//! keyring → plaintext), and translation to `ptinvitee_core::SiteConfig`
//! and `EngineConfig`. The CLI layers its global flags on top.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ptinvitee_core::{EngineConfig, RosterLimits, SiteAuth, SiteConfig};

const KEYRING_SERVICE: &str = "ptinvitee";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("site '{0}' is not configured")]
    UnknownSite(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// `[engine]`: storage location, pagination, timeouts and schedule.
///
/// Durations are humantime strings (`"500ms"`, `"6h"`).
#[derive(Debug, Deserialize, Serialize)]
pub struct EngineSection {
    /// Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_page_delay")]
    pub page_delay: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,

    #[serde(default = "default_read_timeout")]
    pub read_timeout: String,

    #[serde(default = "default_interval")]
    pub refresh_interval: String,

    #[serde(default = "default_interval")]
    pub cache_ttl: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            page_delay: default_page_delay(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            refresh_interval: default_interval(),
            cache_ttl: default_interval(),
        }
    }
}

fn default_page_size() -> usize {
    50
}
fn default_max_pages() -> usize {
    100
}
fn default_page_delay() -> String {
    "0s".into()
}
fn default_connect_timeout() -> String {
    "10s".into()
}
fn default_read_timeout() -> String {
    "30s".into()
}
fn default_interval() -> String {
    "6h".into()
}

/// One `[[sites]]` entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SiteEntry {
    /// Unique name; also the key in the data store.
    pub name: String,

    /// Site base URL.
    pub url: String,

    /// Cookie string (plaintext, prefer keyring or env var).
    pub cookie: Option<String>,

    /// Environment variable holding the cookie.
    pub cookie_env: Option<String>,

    /// API key for token-authenticated sites.
    pub api_key: Option<String>,

    pub api_key_env: Option<String>,

    /// Authorization token paired with `api_key`.
    pub authorization: Option<String>,

    pub authorization_env: Option<String>,

    pub user_agent: Option<String>,

    pub proxy: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SiteEntry {
    /// Whether any token setting is present; such sites authenticate with
    /// the API token pair instead of a cookie.
    pub fn uses_api_token(&self) -> bool {
        [
            &self.api_key,
            &self.api_key_env,
            &self.authorization,
            &self.authorization_env,
        ]
        .iter()
        .any(|v| v.is_some())
    }
}

impl Config {
    pub fn site(&self, name: &str) -> Option<&SiteEntry> {
        self.sites.iter().find(|s| s.name == name)
    }

    pub fn site_mut(&mut self, name: &str) -> Option<&mut SiteEntry> {
        self.sites.iter_mut().find(|s| s.name == name)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ptinvitee", "ptinvitee")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    for part in parts {
        p.push(part);
    }
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "ptinvitee", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for `site_data.json` and `last_run.json`.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "ptinvitee"]),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load from the canonical path plus `PTINVITEE_` environment variables.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus environment. A missing file yields defaults.
///
/// Nested keys use a double underscore: `PTINVITEE_ENGINE__PAGE_SIZE=20`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PTINVITEE_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), sites = config.sites.len(), "config loaded");
    Ok(config)
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(site: &str, kind: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{site}/{kind}"))
}

/// Env var → keyring (`ptinvitee` / `<site>/<kind>`) → plaintext.
fn resolve_secret(
    site: &str,
    kind: &str,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    // 1. Env var named in the site entry
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(secret) = keyring_entry(site, kind).and_then(|e| e.get_password()) {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    plaintext.map(|p| SecretString::from(p.to_string()))
}

pub fn resolve_cookie(site: &SiteEntry) -> Option<SecretString> {
    resolve_secret(
        &site.name,
        "cookie",
        site.cookie_env.as_deref(),
        site.cookie.as_deref(),
    )
}

/// `(api_key, authorization)` if both halves resolve.
pub fn resolve_api_token(site: &SiteEntry) -> Option<(SecretString, SecretString)> {
    let api_key = resolve_secret(
        &site.name,
        "api-key",
        site.api_key_env.as_deref(),
        site.api_key.as_deref(),
    )?;
    let authorization = resolve_secret(
        &site.name,
        "authorization",
        site.authorization_env.as_deref(),
        site.authorization.as_deref(),
    )?;
    Some((api_key, authorization))
}

/// Resolved credentials. Missing ones become `SiteAuth::None`, which the
/// orchestrator reports as incomplete without touching the network.
pub fn resolve_auth(site: &SiteEntry) -> SiteAuth {
    if site.uses_api_token() {
        resolve_api_token(site).map_or(SiteAuth::None, |(api_key, authorization)| {
            SiteAuth::ApiToken {
                api_key,
                authorization,
            }
        })
    } else {
        resolve_cookie(site).map_or(SiteAuth::None, SiteAuth::Cookie)
    }
}

/// Store a cookie in the system keyring for `site`.
pub fn store_cookie(site: &str, cookie: &str) -> Result<(), ConfigError> {
    keyring_entry(site, "cookie")?.set_password(cookie)?;
    Ok(())
}

// ── Translation to core types ───────────────────────────────────────

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim())
        .map_err(|e| invalid(format!("engine.{field}"), format!("'{value}': {e}")))
}

/// Build the core `EngineConfig` from `[engine]`.
pub fn engine_config(cfg: &Config) -> Result<EngineConfig, ConfigError> {
    let e = &cfg.engine;
    if e.page_size == 0 {
        return Err(invalid("engine.page_size", "must be at least 1"));
    }
    if e.max_pages == 0 {
        return Err(invalid("engine.max_pages", "must be at least 1"));
    }
    Ok(EngineConfig {
        data_dir: e.data_dir.clone().unwrap_or_else(default_data_dir),
        roster: RosterLimits {
            page_size: e.page_size,
            max_pages: e.max_pages,
            page_delay: parse_duration("page_delay", &e.page_delay)?,
        },
        connect_timeout: parse_duration("connect_timeout", &e.connect_timeout)?,
        read_timeout: parse_duration("read_timeout", &e.read_timeout)?,
        refresh_interval: parse_duration("refresh_interval", &e.refresh_interval)?,
        cache_ttl: parse_duration("cache_ttl", &e.cache_ttl)?,
    })
}

/// Build a core `SiteConfig` from one entry, resolving its credentials.
pub fn site_to_config(site: &SiteEntry) -> Result<SiteConfig, ConfigError> {
    if site.name.trim().is_empty() {
        return Err(invalid("sites.name", "must not be empty"));
    }
    let url: url::Url = site
        .url
        .parse()
        .map_err(|_| invalid(format!("sites.{}.url", site.name), format!("invalid URL: {}", site.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            format!("sites.{}.url", site.name),
            format!("expected http or https, got '{}'", url.scheme()),
        ));
    }

    let mut config = SiteConfig::new(site.name.clone(), url, resolve_auth(site));
    config.user_agent.clone_from(&site.user_agent);
    config.proxy.clone_from(&site.proxy);
    config.enabled = site.enabled;
    Ok(config)
}

/// Every configured site, in file order. Names must be unique.
pub fn site_configs(cfg: &Config) -> Result<Vec<SiteConfig>, ConfigError> {
    let mut seen = HashSet::new();
    cfg.sites
        .iter()
        .map(|site| {
            if !seen.insert(site.name.as_str()) {
                return Err(invalid("sites.name", format!("duplicate site '{}'", site.name)));
            }
            site_to_config(site)
        })
        .collect()
}
