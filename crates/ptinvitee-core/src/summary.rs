// ── Run summary and notification sink ──

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{Diagnosis, InviteeStats};

/// Per-site progress through one run: `Pending → Fetching → {Success, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SiteState {
    Pending,
    Fetching,
    Success,
    Failed,
}

/// What happened to one site in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteOutcome {
    pub site: String,
    /// Handler family that served the site; empty if never resolved.
    #[serde(default)]
    pub handler: String,
    pub state: SiteState,
    #[serde(default)]
    pub diagnosis: Option<Diagnosis>,
    /// Invite reason on success, failure message otherwise.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stats: InviteeStats,
}

impl SiteOutcome {
    pub fn pending(site: &str) -> Self {
        Self {
            site: site.to_string(),
            handler: String::new(),
            state: SiteState::Pending,
            diagnosis: None,
            message: String::new(),
            stats: InviteeStats::default(),
        }
    }

    pub fn advance(&mut self, next: SiteState) {
        debug!(site = %self.site, from = %self.state, to = %next, "site state");
        self.state = next;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.advance(SiteState::Failed);
    }
}

/// A site that failed during a run, with the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFailure {
    pub site: String,
    pub message: String,
}

/// Outcome of one refresh pass over every configured site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default)]
    pub failures: Vec<SiteFailure>,
    /// Head counts over the sites refreshed successfully in this run.
    #[serde(default)]
    pub stats: InviteeStats,
    #[serde(default)]
    pub sites: Vec<SiteOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            failures: Vec::new(),
            stats: InviteeStats::default(),
            sites: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn record_success(&mut self, stats: InviteeStats) {
        self.success_count += 1;
        self.stats.merge(stats);
    }

    pub fn record_failure(&mut self, site: impl Into<String>, message: impl Into<String>) {
        self.failure_count += 1;
        self.failures.push(SiteFailure {
            site: site.into(),
            message: message.into(),
        });
    }

    /// The recorded failure for `site`, if it failed in this run.
    pub fn failure_for(&self, site: &str) -> Option<&SiteFailure> {
        self.failures.iter().find(|f| f.site == site)
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count == 0
    }
}

/// Receives the summary at the end of every run.
///
/// Delivery errors are logged by the orchestrator and never fail the run.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, summary: &RunSummary) -> Result<(), CoreError>;
}

/// Writes the summary to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, summary: &RunSummary) -> Result<(), CoreError> {
        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            invitees = summary.stats.total,
            disabled = summary.stats.disabled,
            low_ratio = summary.stats.low_ratio,
            "refresh finished"
        );
        for failure in &summary.failures {
            warn!(site = %failure.site, "{}", failure.message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_records() {
        let mut summary = RunSummary::new(Utc::now());
        summary.record_success(InviteeStats {
            total: 3,
            ..InviteeStats::default()
        });
        summary.record_success(InviteeStats {
            total: 2,
            disabled: 1,
            ..InviteeStats::default()
        });
        summary.record_failure("beta", "Authentication failed");

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.stats.total, 5);
        assert_eq!(summary.stats.disabled, 1);
        assert!(!summary.is_clean());
        assert_eq!(
            summary.failure_for("beta").map(|f| f.message.as_str()),
            Some("Authentication failed")
        );
        assert!(summary.failure_for("alpha").is_none());
    }

    #[test]
    fn outcome_walks_the_state_machine() {
        let mut outcome = SiteOutcome::pending("alpha");
        assert_eq!(outcome.state, SiteState::Pending);
        outcome.advance(SiteState::Fetching);
        outcome.fail("HTTP 502");
        assert_eq!(outcome.state, SiteState::Failed);
        assert_eq!(outcome.message, "HTTP 502");
        assert_eq!(SiteState::Failed.to_string(), "failed");
    }
}
