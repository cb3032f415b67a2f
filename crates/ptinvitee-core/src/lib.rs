// ptinvitee-core: invitee aggregation engine between ptinvitee-api and consumers (CLI).

pub mod config;
pub mod error;
pub mod handler;
pub mod html;
pub mod model;
pub mod orchestrator;
pub mod roster;
pub mod store;
pub mod summary;
pub mod units;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CredentialKind, EngineConfig, RosterLimits, SiteAuth, SiteConfig};
pub use error::CoreError;
pub use handler::{HandlerRegistry, SiteHandler};
pub use orchestrator::{Clock, Orchestrator, RefreshOutcome};
pub use roster::{RosterFetcher, RosterOutcome, RosterSource, TerminationReason};
pub use store::{SiteData, SiteDataStore};
pub use summary::{LogSink, NotificationSink, RunSummary, SiteFailure, SiteOutcome, SiteState};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Diagnosis, InviteStatus, InviteeRecord, InviteeStats, RatioHealth, SiteSnapshot, StoredSite,
};
