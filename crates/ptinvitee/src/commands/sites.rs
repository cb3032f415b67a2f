//! Site command handlers.

use serde::Serialize;
use tabled::Tabled;

use ptinvitee_config::{Config, SiteEntry, engine_config, resolve_auth};
use ptinvitee_core::{HandlerRegistry, SiteAuth};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

/// A configured site as listed; credentials are reduced to their kind.
#[derive(Serialize)]
struct SiteInfo {
    name: String,
    url: String,
    handler: &'static str,
    auth: &'static str,
    enabled: bool,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Handler")]
    handler: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

fn auth_kind(entry: &SiteEntry) -> &'static str {
    match resolve_auth(entry) {
        SiteAuth::Cookie(_) => "cookie",
        SiteAuth::ApiToken { .. } => "api token",
        SiteAuth::None => "missing",
    }
}

fn describe(cfg: &Config, registry: &HandlerRegistry) -> Vec<SiteInfo> {
    cfg.sites
        .iter()
        .map(|entry| SiteInfo {
            name: entry.name.clone(),
            url: entry.url.clone(),
            handler: registry.resolve(&entry.url).name(),
            auth: auth_kind(entry),
            enabled: entry.enabled,
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SitesArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SitesCommand::List => {
            let engine = engine_config(cfg)?;
            let registry = HandlerRegistry::with_limits(engine.roster);
            let sites = describe(cfg, &registry);
            if sites.is_empty() && !global.quiet {
                eprintln!(
                    "No sites configured in {}",
                    config::active_path(global).display()
                );
            }
            let color = output::should_color(global.color_mode());
            let out = output::render_list(
                global.format(),
                &sites,
                |s| SiteRow {
                    name: s.name.clone(),
                    url: s.url.clone(),
                    handler: s.handler.to_string(),
                    auth: if s.auth == "missing" {
                        output::paint_warning(s.auth, color)
                    } else {
                        s.auth.to_string()
                    },
                    enabled: output::paint_flag(s.enabled, color),
                },
                |s| s.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Forget { name, all } => {
            let (_, store) = config::store(cfg)?;
            let Some(name) = name.filter(|_| !all) else {
                store.clear().await?;
                if !global.quiet {
                    eprintln!("All stored site data removed");
                }
                return Ok(());
            };
            if !store.remove(&name).await? {
                return Err(CliError::NotFound {
                    resource_type: "stored site".into(),
                    identifier: name,
                    list_command: "show".into(),
                });
            }
            if !global.quiet {
                eprintln!("Stored data for '{name}' removed");
            }
            Ok(())
        }
    }
}
