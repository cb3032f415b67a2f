//! Refresh command: one pass over the configured sites.

use std::fmt::Write as _;

use tabled::Tabled;

use ptinvitee_config::site_configs;
use ptinvitee_core::{Orchestrator, RefreshOutcome, RunSummary, SiteOutcome};

use crate::cli::{GlobalOpts, RefreshArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct OutcomeRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Handler")]
    handler: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Invitees")]
    invitees: usize,
    #[tabled(rename = "Message")]
    message: String,
}

impl OutcomeRow {
    pub(crate) fn new(o: &SiteOutcome, color: bool) -> Self {
        Self {
            site: o.site.clone(),
            handler: o.handler.clone(),
            state: output::paint_state(o.state, color),
            invitees: o.stats.total,
            message: o.message.clone(),
        }
    }
}

/// Run table followed by a one-line tally.
pub(crate) fn render_summary(summary: &RunSummary, color: bool) -> String {
    let rows: Vec<OutcomeRow> = summary
        .sites
        .iter()
        .map(|o| OutcomeRow::new(o, color))
        .collect();
    let mut out = output::render_table(&rows);
    let _ = write!(
        out,
        "\n{} succeeded, {} failed, {} invitees ({} low ratio)",
        summary.success_count,
        summary.failure_count,
        summary.stats.total,
        summary.stats.low_ratio,
    );
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: RefreshArgs,
    cfg: &ptinvitee_config::Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let orchestrator = if args.if_stale {
        match stale_only(cfg, global, args.site.as_deref()).await? {
            Some(orch) => orch,
            None => {
                if !global.quiet {
                    eprintln!("All sites are within the cache TTL, nothing to refresh");
                }
                return Ok(());
            }
        }
    } else {
        config::orchestrator(global, cfg)?
    };

    let outcome = match args.site.as_deref() {
        Some(name) => orchestrator.refresh_site(name).await?,
        None => orchestrator.refresh_now().await,
    };
    let RefreshOutcome::Completed(summary) = outcome else {
        return Err(CliError::AlreadyRunning);
    };

    let color = output::should_color(global.color_mode());
    let out = output::render_single(
        global.format(),
        &summary,
        |s| render_summary(s, color),
        |s| {
            s.sites
                .iter()
                .map(|o| format!("{}\t{}", o.site, o.state))
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);

    if summary.is_clean() {
        Ok(())
    } else {
        Err(CliError::RefreshFailed {
            failed: summary.failure_count,
            total: summary.sites.len(),
        })
    }
}

/// Orchestrator over the sites whose stored data is older than the cache
/// TTL, or `None` when every candidate is still fresh.
async fn stale_only(
    cfg: &ptinvitee_config::Config,
    global: &GlobalOpts,
    only: Option<&str>,
) -> Result<Option<Orchestrator>, CliError> {
    if let Some(name) = only {
        if cfg.site(name).is_none() {
            return Err(CliError::NotFound {
                resource_type: "site".into(),
                identifier: name.to_string(),
                list_command: "sites list".into(),
            });
        }
    } else if cfg.sites.is_empty() {
        return Err(CliError::NoSites {
            path: config::active_path(global).display().to_string(),
        });
    }

    let (engine, store) = config::store(cfg)?;
    let now = chrono::Utc::now().timestamp();

    let mut stale = Vec::new();
    for site in site_configs(cfg)? {
        let candidate = match only {
            Some(name) => site.name == name,
            None => site.enabled,
        };
        if candidate && !store.is_fresh(&site.name, engine.cache_ttl, now).await? {
            stale.push(site);
        }
    }

    if stale.is_empty() {
        return Ok(None);
    }
    Ok(Some(Orchestrator::new(stale, engine)))
}
