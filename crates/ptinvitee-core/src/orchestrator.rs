// ── Refresh orchestrator ──
//
// One pass visits every enabled site in order: resolve its handler, build
// a session, parse, then either persist the snapshot or record the failure
// and leave the stored one alone. At most one pass runs at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ptinvitee_api::SiteSession;

use crate::config::{EngineConfig, SiteConfig};
use crate::error::CoreError;
use crate::handler::HandlerRegistry;
use crate::model::SiteSnapshot;
use crate::store::SiteDataStore;
use crate::summary::{LogSink, NotificationSink, RunSummary, SiteOutcome, SiteState};

/// Source of "now". Injectable so tests get stable timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of asking for a refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Completed(RunSummary),
    /// Another pass was in flight; nothing was done.
    AlreadyRunning,
}

/// Releases the single-flight flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives refresh passes over the configured sites.
pub struct Orchestrator {
    sites: Vec<SiteConfig>,
    engine: EngineConfig,
    registry: HandlerRegistry,
    store: Arc<SiteDataStore>,
    sink: Arc<dyn NotificationSink>,
    clock: Clock,
    running: AtomicBool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sites", &self.sites.len())
            .field("registry", &self.registry)
            .field("store", &self.store.dir())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Default handlers, a store under `engine.data_dir`, and a log sink.
    pub fn new(sites: Vec<SiteConfig>, engine: EngineConfig) -> Self {
        let registry = HandlerRegistry::with_limits(engine.roster);
        let store = Arc::new(SiteDataStore::new(engine.data_dir.clone()));
        Self {
            sites,
            engine,
            registry,
            store,
            sink: Arc::new(LogSink),
            clock: Arc::new(Utc::now),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_handlers(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_store(mut self, store: Arc<SiteDataStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<SiteDataStore> {
        &self.store
    }

    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ── Refresh entry points ─────────────────────────────────────────

    /// Refresh every enabled site.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.run(None).await
    }

    /// Refresh one site by name, enabled or not.
    pub async fn refresh_site(&self, name: &str) -> Result<RefreshOutcome, CoreError> {
        if !self.sites.iter().any(|s| s.name == name) {
            return Err(CoreError::SiteNotFound {
                name: name.to_string(),
            });
        }
        Ok(self.run(Some(name)).await)
    }

    async fn run(&self, only: Option<&str>) -> RefreshOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("refresh already running, request ignored");
            return RefreshOutcome::AlreadyRunning;
        };

        let mut summary = RunSummary::new((self.clock)());
        let mut selected = Vec::new();
        for site in &self.sites {
            let wanted = match only {
                Some(name) => site.name == name,
                None => site.enabled,
            };
            if wanted {
                selected.push(site);
            } else if only.is_none() {
                debug!(site = %site.name, "site disabled, skipped");
            }
        }
        info!(sites = selected.len(), "refresh started");

        let mut outcomes = Vec::with_capacity(selected.len());
        for site in selected {
            let mut outcome = SiteOutcome::pending(&site.name);
            self.refresh_one(site, &mut outcome).await;
            if outcome.state == SiteState::Success {
                summary.record_success(outcome.stats);
            } else {
                summary.record_failure(&outcome.site, &outcome.message);
            }
            outcomes.push(outcome);
        }

        summary.sites = outcomes;
        summary.finished_at = (self.clock)();

        if let Err(e) = self.store.save_last_run(&summary).await {
            warn!(error = %e, "could not persist run summary");
        }
        if let Err(e) = self.sink.deliver(&summary).await {
            warn!(error = %e, "summary delivery failed");
        }
        RefreshOutcome::Completed(summary)
    }

    /// Fetch one site and apply the success/failure policy.
    async fn refresh_one(&self, site: &SiteConfig, outcome: &mut SiteOutcome) {
        outcome.advance(SiteState::Fetching);
        match self.fetch(site, outcome).await {
            Ok(snapshot) => {
                let status = &snapshot.invite_status;
                outcome.diagnosis = Some(status.diagnosis);
                if status.diagnosis.is_failure() {
                    warn!(
                        site = %site.name,
                        diagnosis = %status.diagnosis,
                        reason = %status.reason,
                        "site parse failed, keeping stored data"
                    );
                    outcome.fail(status.reason.clone());
                    return;
                }
                if status.diagnosis.needs_review() {
                    warn!(
                        site = %site.name,
                        reason = %status.reason,
                        "invite permission flagged for review"
                    );
                }
                let stats = snapshot.stats();
                let now = (self.clock)().timestamp();
                match self.store.update(&site.name, snapshot, now).await {
                    Ok(stored) => {
                        info!(
                            site = %site.name,
                            invitees = stats.total,
                            can_invite = stored.data.invite_status.can_invite,
                            "site refreshed"
                        );
                        outcome.message = stored.data.invite_status.reason;
                        outcome.stats = stats;
                        outcome.advance(SiteState::Success);
                    }
                    Err(e) => {
                        warn!(site = %site.name, error = %e, "could not store snapshot");
                        outcome.fail(e.to_string());
                    }
                }
            }
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(site = %site.name, error = %e, "credentials rejected, keeping stored data");
                } else if e.is_transport_failure() {
                    warn!(site = %site.name, error = %e, "site unreachable, keeping stored data");
                } else {
                    warn!(site = %site.name, error = %e, "site refresh failed, keeping stored data");
                }
                outcome.fail(e.to_string());
            }
        }
    }

    async fn fetch(
        &self,
        site: &SiteConfig,
        outcome: &mut SiteOutcome,
    ) -> Result<SiteSnapshot, CoreError> {
        let handler = self.registry.resolve(site.url.as_str());
        outcome.handler = handler.name().to_string();
        debug!(site = %site.name, handler = handler.name(), "handler resolved");

        if let Some(missing) = site.missing_credentials(handler.credential()) {
            return Err(CoreError::IncompleteCredentials {
                site: site.name.clone(),
                missing: missing.to_string(),
            });
        }
        let session = SiteSession::new(site.url.clone(), &site.transport(&self.engine))?;
        handler.parse_invite_page(site, &session).await
    }

    // ── Periodic mode ────────────────────────────────────────────────

    /// Refresh every `interval` until `cancel` fires. The first pass runs
    /// one interval after the call. A zero interval only waits for `cancel`.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            if interval.is_zero() {
                warn!("periodic refresh disabled (zero interval)");
                cancel.cancelled().await;
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let RefreshOutcome::Completed(summary) = self.refresh_now().await {
                            debug!(
                                succeeded = summary.success_count,
                                failed = summary.failure_count,
                                "periodic refresh done"
                            );
                        }
                    }
                }
            }
            debug!("periodic refresh stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn run_guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::acquire(&flag).unwrap();
        assert!(RunGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(RunGuard::acquire(&flag).is_some());
    }
}
