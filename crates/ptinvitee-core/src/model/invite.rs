// ── Invite permission and quota ──

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::units;

/// Structured verdict of a handler's permission parse.
///
/// Replaces pattern matching over the human-readable `reason`. The
/// orchestrator consults [`Diagnosis::is_failure`] to decide whether a
/// parse that returned `Ok` may still be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Diagnosis {
    /// Invites can be sent right now.
    Invitable,
    /// The site states why invites are unavailable (class, quota, closed).
    Restricted,
    /// No positive or negative permission signal was found.
    #[default]
    PermissionUndetermined,
    /// The user id could not be read; the cookie is most likely stale.
    UserIdUnavailable,
    /// The permission page could not be fetched.
    InvitePageUnreachable,
    /// None of the expected page structures were present.
    PageUnrecognized,
}

impl Diagnosis {
    /// Whether the run must treat this result as a failed fetch.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::UserIdUnavailable | Self::InvitePageUnreachable | Self::PageUnrecognized
        )
    }

    /// Parse ambiguity that should be surfaced for review.
    pub fn needs_review(self) -> bool {
        matches!(self, Self::PermissionUndetermined)
    }
}

/// Per-site invite state for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InviteStatus {
    pub can_invite: bool,
    /// Human-readable cause; never empty once a handler returns `Ok`.
    pub reason: String,
    pub permanent_count: u32,
    pub temporary_count: u32,
    /// Currency balance (magic points, bonus, …).
    #[serde(default)]
    pub bonus: f64,
    #[serde(default)]
    pub permanent_invite_price: f64,
    #[serde(default)]
    pub temporary_invite_price: f64,
    #[serde(default)]
    pub diagnosis: Diagnosis,
}

impl InviteStatus {
    pub fn purchasable_permanent(&self) -> u64 {
        units::purchasable(self.bonus, self.permanent_invite_price)
    }

    pub fn purchasable_temporary(&self) -> u64 {
        units::purchasable(self.bonus, self.temporary_invite_price)
    }

    pub fn has_quota(&self) -> bool {
        self.permanent_count > 0 || self.temporary_count > 0
    }

    /// Default reason for a quota-based verdict.
    pub fn quota_reason(&self) -> String {
        format!(
            "可用邀请数: 永久={}, 临时={}",
            self.permanent_count, self.temporary_count
        )
    }

    /// Mark as invitable with the given reason.
    pub fn allow(&mut self, reason: impl Into<String>) {
        self.can_invite = true;
        self.reason = reason.into();
        self.diagnosis = Diagnosis::Invitable;
    }

    /// Mark as restricted with the site-provided explanation.
    pub fn restrict(&mut self, reason: impl Into<String>) {
        self.can_invite = false;
        self.reason = reason.into();
        self.diagnosis = Diagnosis::Restricted;
    }

    /// Record a failure diagnosis with its explanation.
    pub fn fail(&mut self, diagnosis: Diagnosis, reason: impl Into<String>) {
        self.can_invite = false;
        self.reason = reason.into();
        self.diagnosis = diagnosis;
    }

    /// Append what the currency balance can buy to the reason text.
    ///
    /// Leaves `can_invite` alone: buying an invite is a separate action.
    pub fn append_purchase_hint(&mut self, currency: &str) {
        let mut offers = Vec::new();
        let temp = self.purchasable_temporary();
        if temp > 0 {
            offers.push(format!(
                "临时邀请({temp}个, {}{currency}/个)",
                self.temporary_invite_price
            ));
        }
        let perm = self.purchasable_permanent();
        if perm > 0 {
            offers.push(format!(
                "永久邀请({perm}个, {}{currency}/个)",
                self.permanent_invite_price
            ));
        }
        if offers.is_empty() {
            return;
        }
        let hint = format!(
            "{currency}({}) 可购买 {}",
            self.bonus,
            offers.join(", ")
        );
        if self.reason.is_empty() {
            self.reason = hint;
        } else {
            self.reason = format!("{}; {hint}", self.reason);
        }
    }

    /// Guarantee a non-empty reason, downgrading to
    /// [`Diagnosis::PermissionUndetermined`] when nothing was detected.
    pub fn ensure_reason(&mut self) {
        if !self.reason.trim().is_empty() {
            return;
        }
        if self.can_invite {
            self.reason = self.quota_reason();
        } else {
            self.diagnosis = Diagnosis::PermissionUndetermined;
            self.reason = "未检测到邀请权限信号，需人工确认".into();
        }
    }
}
