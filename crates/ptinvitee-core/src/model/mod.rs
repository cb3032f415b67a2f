// ── Domain model ──
//
// Canonical types shared by handlers, the store and consumers. Records
// are built fresh on every parse and never mutated across refreshes.

pub mod invite;
pub mod invitee;
pub mod snapshot;

pub use invite::{Diagnosis, InviteStatus};
pub use invitee::{InviteeRecord, RatioHealth};
pub use snapshot::{InviteeStats, SiteSnapshot, StoredSite};
