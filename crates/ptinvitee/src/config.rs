//! CLI configuration: thin wrapper around `ptinvitee_config`.
//!
//! Honors `--config` and builds the core engine objects the commands share.

use std::path::PathBuf;

use ptinvitee_config::{Config, engine_config, load_config_from, site_configs};
use ptinvitee_core::{EngineConfig, Orchestrator, SiteDataStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` or the platform default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ptinvitee_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&active_path(global))?)
}

/// Engine settings plus a store over `engine.data_dir`, for read-only commands.
pub fn store(cfg: &Config) -> Result<(EngineConfig, SiteDataStore), CliError> {
    let engine = engine_config(cfg)?;
    let store = SiteDataStore::new(engine.data_dir.clone());
    Ok((engine, store))
}

/// Orchestrator over every configured site. Errors if none are configured.
pub fn orchestrator(global: &GlobalOpts, cfg: &Config) -> Result<Orchestrator, CliError> {
    let sites = site_configs(cfg)?;
    if sites.is_empty() {
        return Err(CliError::NoSites {
            path: active_path(global).display().to_string(),
        });
    }
    Ok(Orchestrator::new(sites, engine_config(cfg)?))
}
