//! Status command: the persisted summary of the last run.

use std::fmt::Write as _;

use ptinvitee_config::Config;
use ptinvitee_core::RunSummary;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

use super::refresh::render_summary;

fn detail(summary: &RunSummary, last_update: Option<i64>, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Last run:    {} ({}s)",
        summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        (summary.finished_at - summary.started_at).num_seconds()
    );
    if let Some(ts) = last_update {
        let _ = writeln!(out, "Newest data: {}", output::format_timestamp(ts));
    }
    out.push_str(&render_summary(summary, color));
    out
}

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (_, store) = config::store(cfg)?;
    let Some(summary) = store.load_last_run().await? else {
        if !global.quiet {
            eprintln!("No refresh has run yet. Run: ptinvitee refresh");
        }
        return Ok(());
    };
    let last_update = store.last_update_time().await?;
    let color = output::should_color(global.color_mode());

    let out = output::render_single(
        global.format(),
        &summary,
        |s| detail(s, last_update, color),
        |s| {
            s.failures
                .iter()
                .map(|f| f.site.clone())
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use ptinvitee_core::{InviteeStats, SiteOutcome, SiteState};

    use super::*;

    #[test]
    fn detail_shows_tally_and_failures() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        let mut summary = RunSummary::new(start);
        summary.finished_at = DateTime::from_timestamp(1_700_000_012, 0).unwrap_or_default();

        let mut ok = SiteOutcome::pending("ssd");
        ok.advance(SiteState::Fetching);
        ok.advance(SiteState::Success);
        ok.stats = InviteeStats {
            total: 3,
            low_ratio: 1,
            ..InviteeStats::default()
        };
        summary.record_success(ok.stats);

        let mut bad = SiteOutcome::pending("hdk");
        bad.fail("Unexpected HTTP 502");
        summary.record_failure("hdk", "Unexpected HTTP 502");
        summary.sites = vec![ok, bad];

        let out = detail(&summary, Some(1_700_000_010), false);
        assert!(out.contains("(12s)"));
        assert!(out.contains("Newest data: 2023-11-14"));
        assert!(out.contains("Unexpected HTTP 502"));
        assert!(out.contains("1 succeeded, 1 failed, 3 invitees (1 low ratio)"));
    }
}
