//! Show command: stored snapshots, per site or as an overview.

use std::fmt::Write as _;

use tabled::Tabled;

use ptinvitee_config::Config;
use ptinvitee_core::units::format_size;
use ptinvitee_core::{InviteeRecord, RatioHealth, RunSummary, SiteData, StoredSite};

use crate::cli::{GlobalOpts, ShowArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Invite")]
    can_invite: String,
    #[tabled(rename = "Quota (P/T)")]
    quota: String,
    #[tabled(rename = "Invitees")]
    invitees: usize,
    #[tabled(rename = "Low ratio")]
    low_ratio: usize,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Note")]
    note: String,
}

#[derive(Tabled)]
struct InviteeRow {
    #[tabled(rename = "User")]
    username: String,
    #[tabled(rename = "Uploaded")]
    uploaded: String,
    #[tabled(rename = "Downloaded")]
    downloaded: String,
    #[tabled(rename = "Ratio")]
    ratio: String,
    #[tabled(rename = "Seeding")]
    seeding: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl InviteeRow {
    fn new(r: &InviteeRecord, color: bool) -> Self {
        let status = if r.enabled {
            r.status_text.clone()
        } else {
            output::paint_warning("disabled", color)
        };
        let seeding = if r.seeding_count == 0 && r.seeding_size_bytes <= 0.0 {
            String::new()
        } else {
            format!("{} / {}", r.seeding_count, format_size(r.seeding_size_bytes))
        };
        Self {
            username: r.username.clone(),
            uploaded: format_size(r.uploaded_bytes),
            downloaded: format_size(r.downloaded_bytes),
            ratio: output::paint_ratio(&r.ratio_display, r.ratio_health, color),
            seeding,
            status,
        }
    }
}

fn is_low(r: &InviteeRecord) -> bool {
    matches!(r.ratio_health, RatioHealth::Warning | RatioHealth::Danger)
}

/// "stale since …" when the last run failed for this site.
fn stale_note(site: &str, stored: &StoredSite, last_run: Option<&RunSummary>) -> Option<String> {
    last_run.and_then(|run| run.failure_for(site)).map(|f| {
        format!(
            "stale since {}: {}",
            output::format_timestamp(stored.last_update),
            f.message
        )
    })
}

// ── Renderers ───────────────────────────────────────────────────────

fn overview_table(data: &SiteData, last_run: Option<&RunSummary>, color: bool) -> String {
    let rows: Vec<SiteRow> = data
        .iter()
        .map(|(name, stored)| {
            let status = &stored.data.invite_status;
            let stats = stored.data.stats();
            SiteRow {
                site: name.clone(),
                can_invite: output::paint_flag(status.can_invite, color),
                quota: format!("{}/{}", status.permanent_count, status.temporary_count),
                invitees: stats.total,
                low_ratio: stats.low_ratio,
                updated: output::format_timestamp(stored.last_update),
                note: stale_note(name, stored, last_run)
                    .map(|n| output::paint_warning(&n, color))
                    .unwrap_or_default(),
            }
        })
        .collect();
    output::render_table(&rows)
}

fn detail(
    name: &str,
    stored: &StoredSite,
    last_run: Option<&RunSummary>,
    color: bool,
) -> String {
    let status = &stored.data.invite_status;
    let mut out = String::new();
    let _ = writeln!(out, "Site:        {name}");
    if !stored.data.site_url.is_empty() {
        let _ = writeln!(out, "URL:         {}", stored.data.site_url);
    }
    let _ = writeln!(
        out,
        "Can invite:  {} ({})",
        output::paint_flag(status.can_invite, color),
        status.reason
    );
    let _ = writeln!(
        out,
        "Quota:       permanent {}, temporary {}",
        status.permanent_count, status.temporary_count
    );
    if status.bonus > 0.0 {
        let _ = writeln!(
            out,
            "Bonus:       {:.1} (buys {} permanent, {} temporary)",
            status.bonus,
            status.purchasable_permanent(),
            status.purchasable_temporary()
        );
    }
    let _ = writeln!(out, "Diagnosis:   {}", status.diagnosis);
    let _ = writeln!(
        out,
        "Updated:     {}",
        output::format_timestamp(stored.last_update)
    );
    if let Some(note) = stale_note(name, stored, last_run) {
        let _ = writeln!(out, "{}", output::paint_warning(&note, color));
    }

    let rows: Vec<InviteeRow> = stored
        .data
        .invitees
        .iter()
        .map(|r| InviteeRow::new(r, color))
        .collect();
    if rows.is_empty() {
        out.push_str("\nNo invitees");
    } else {
        out.push('\n');
        out.push_str(&output::render_table(&rows));
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ShowArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (_, store) = config::store(cfg)?;
    let last_run = store.load_last_run().await?;
    let color = output::should_color(global.color_mode());

    let out = match args.site {
        None => {
            let data = store.all().await?;
            if data.is_empty() && !global.quiet {
                eprintln!("No stored data yet. Run: ptinvitee refresh");
            }
            output::render_single(
                global.format(),
                &data,
                |d| overview_table(d, last_run.as_ref(), color),
                |d| d.keys().cloned().collect::<Vec<_>>().join("\n"),
            )
        }
        Some(name) => {
            let mut stored = store.get(&name).await?.ok_or_else(|| CliError::NotFound {
                resource_type: "stored site".into(),
                identifier: name.clone(),
                list_command: "show".into(),
            })?;
            if args.low_ratio {
                stored.data.invitees.retain(is_low);
            }
            output::render_single(
                global.format(),
                &stored,
                |s| detail(&name, s, last_run.as_ref(), color),
                |s| {
                    s.data
                        .invitees
                        .iter()
                        .map(|r| r.username.clone())
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            )
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use ptinvitee_core::SiteSnapshot;

    use super::*;

    fn stored() -> StoredSite {
        let mut data = SiteSnapshot::default();
        data.invite_status.can_invite = true;
        data.invite_status.reason = "可以发送邀请".into();
        data.invite_status.permanent_count = 2;
        data.invitees.push(InviteeRecord {
            username: "alice".into(),
            enabled: true,
            uploaded_bytes: 2048.0,
            ratio_display: "0.100".into(),
            ratio_value: 0.1,
            ratio_health: RatioHealth::Danger,
            ..Default::default()
        });
        data.invitees.push(InviteeRecord {
            username: "bob".into(),
            enabled: false,
            ratio_display: "5.000".into(),
            ratio_value: 5.0,
            ratio_health: RatioHealth::Excellent,
            ..Default::default()
        });
        StoredSite {
            data,
            last_update: 0,
        }
    }

    fn failed_run(site: &str) -> RunSummary {
        let mut run = RunSummary::new(DateTime::from_timestamp(60, 0).unwrap_or_default());
        run.record_failure(site, "Authentication failed: cookie expired");
        run
    }

    #[test]
    fn detail_lists_invitees_and_quota() {
        let out = detail("ssd", &stored(), None, false);
        assert!(out.contains("Can invite:  yes (可以发送邀请)"));
        assert!(out.contains("permanent 2, temporary 0"));
        assert!(out.contains("alice"));
        assert!(out.contains("disabled"));
        assert!(out.contains("2.00 KB"));
        assert!(!out.contains("stale since"));
    }

    #[test]
    fn failed_site_is_marked_stale() {
        let run = failed_run("ssd");
        let out = detail("ssd", &stored(), Some(&run), false);
        assert!(out.contains("stale since 1970-01-01 00:00:00 UTC: Authentication failed"));

        let other = detail("hdk", &stored(), Some(&run), false);
        assert!(!other.contains("stale since"));
    }

    #[test]
    fn low_ratio_filter_keeps_warning_and_danger() {
        let mut site = stored();
        site.data.invitees.retain(is_low);
        let names: Vec<_> = site.data.invitees.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["alice"]);
    }

    #[test]
    fn overview_has_one_row_per_site() {
        let mut data = SiteData::new();
        data.insert("ssd".into(), stored());
        data.insert("hdk".into(), stored());
        let run = failed_run("hdk");
        let out = overview_table(&data, Some(&run), false);
        assert!(out.contains("ssd"));
        assert!(out.contains("2/0"));
        assert_eq!(out.matches("stale since").count(), 1);
    }
}
