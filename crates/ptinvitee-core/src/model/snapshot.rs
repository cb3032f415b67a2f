// ── Per-site aggregate ──

use serde::{Deserialize, Serialize};

use super::{InviteStatus, InviteeRecord, RatioHealth};

/// Everything a handler learned about one site in one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SiteSnapshot {
    pub invite_status: InviteStatus,
    #[serde(default)]
    pub invitees: Vec<InviteeRecord>,
    #[serde(default)]
    pub site_url: String,
}

impl SiteSnapshot {
    pub fn stats(&self) -> InviteeStats {
        let mut stats = InviteeStats::default();
        for r in &self.invitees {
            stats.add(r);
        }
        stats
    }
}

/// A stored snapshot with the unix time of the refresh that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSite {
    pub data: SiteSnapshot,
    pub last_update: i64,
}

/// Roster head counts, per site or across sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InviteeStats {
    pub total: usize,
    pub disabled: usize,
    pub no_data: usize,
    pub low_ratio: usize,
}

impl InviteeStats {
    fn add(&mut self, r: &InviteeRecord) {
        self.total += 1;
        if !r.enabled {
            self.disabled += 1;
        }
        if r.is_no_data {
            self.no_data += 1;
        }
        if matches!(r.ratio_health, RatioHealth::Warning | RatioHealth::Danger) {
            self.low_ratio += 1;
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.total += other.total;
        self.disabled += other.disabled;
        self.no_data += other.no_data;
        self.low_ratio += other.low_ratio;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_health_and_state() {
        let snapshot = SiteSnapshot {
            invitees: vec![
                InviteeRecord {
                    enabled: true,
                    ratio_health: RatioHealth::Good,
                    ..InviteeRecord::default()
                },
                InviteeRecord {
                    enabled: false,
                    ratio_health: RatioHealth::Danger,
                    ..InviteeRecord::default()
                },
                InviteeRecord {
                    enabled: true,
                    is_no_data: true,
                    ratio_health: RatioHealth::Neutral,
                    ..InviteeRecord::default()
                },
            ],
            ..SiteSnapshot::default()
        };
        let stats = snapshot.stats();
        assert_eq!(
            stats,
            InviteeStats {
                total: 3,
                disabled: 1,
                no_data: 1,
                low_ratio: 1
            }
        );
    }
}
