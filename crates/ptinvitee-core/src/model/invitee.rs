// ── Invitee domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::units;

/// Share-ratio health tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RatioHealth {
    Excellent,
    Good,
    Warning,
    Danger,
    /// No traffic in either direction.
    Neutral,
    #[default]
    Unknown,
}

impl RatioHealth {
    /// Ordering used for sorting and monotonicity checks (worst first).
    /// `Neutral` and `Unknown` sit outside the scale.
    pub fn rank(self) -> i8 {
        match self {
            Self::Danger => 0,
            Self::Warning => 1,
            Self::Good => 2,
            Self::Excellent => 3,
            Self::Neutral | Self::Unknown => -1,
        }
    }
}

/// One referred member of a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InviteeRecord {
    pub username: String,
    /// Identity key within a site; falls back to `username` when empty.
    #[serde(default)]
    pub profile_url: String,
    #[serde(default)]
    pub email: String,
    pub enabled: bool,
    pub uploaded_bytes: f64,
    pub downloaded_bytes: f64,
    pub ratio_display: String,
    pub ratio_value: f64,
    pub ratio_health: RatioHealth,
    #[serde(default)]
    pub seeding_count: u32,
    #[serde(default)]
    pub seeding_size_bytes: f64,
    #[serde(default)]
    pub last_seed_report: String,
    #[serde(default)]
    pub status_text: String,
    /// Per-invitee seeding bonus figure as displayed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seed_magic: String,
    /// Bonus the inviter earns from this member, as displayed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seed_bonus: String,
    #[serde(default)]
    pub is_no_data: bool,
}

impl InviteeRecord {
    /// Stable identifier used for pagination repetition checks.
    pub fn identity(&self) -> &str {
        if self.profile_url.is_empty() {
            &self.username
        } else {
            &self.profile_url
        }
    }

    /// Fill the derived ratio fields from the byte counts and an optional
    /// site-rendered ratio cell, then classify health.
    ///
    /// A site-rendered ratio wins over the computed one when it parses and
    /// is not a placeholder.
    pub fn derive_ratio(&mut self, ratio_cell: Option<&str>) {
        self.is_no_data = units::is_no_data(self.uploaded_bytes, self.downloaded_bytes);
        let (computed_display, computed_value) =
            units::compute_ratio(self.uploaded_bytes, self.downloaded_bytes);

        let site_ratio = ratio_cell
            .filter(|cell| !units::is_placeholder(cell))
            .and_then(|cell| units::parse_ratio_text(cell).map(|v| (cell, v)));
        match site_ratio {
            Some((cell, value)) => {
                self.ratio_display = units::normalize_ratio_display(cell);
                self.ratio_value = value;
            }
            None => {
                self.ratio_display = computed_display;
                self.ratio_value = computed_value;
            }
        }
        self.ratio_health = units::classify_ratio_health(self.ratio_value, self.is_no_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_profile_url() {
        let mut r = InviteeRecord {
            username: "alice".into(),
            ..InviteeRecord::default()
        };
        assert_eq!(r.identity(), "alice");
        r.profile_url = "https://pt.example/userdetails.php?id=9".into();
        assert_eq!(r.identity(), "https://pt.example/userdetails.php?id=9");
    }

    #[test]
    fn derive_ratio_uses_site_cell_when_parseable() {
        let mut r = InviteeRecord {
            uploaded_bytes: 100.0,
            downloaded_bytes: 400.0,
            ..InviteeRecord::default()
        };
        r.derive_ratio(Some("Inf."));
        assert_eq!(r.ratio_display, "∞");
        assert_eq!(r.ratio_health, RatioHealth::Excellent);

        r.derive_ratio(Some("garbled"));
        assert_eq!(r.ratio_display, "0.250");
        assert_eq!(r.ratio_health, RatioHealth::Danger);
    }

    #[test]
    fn placeholder_cell_falls_back_to_bytes() {
        let mut r = InviteeRecord {
            uploaded_bytes: 2048.0,
            downloaded_bytes: 0.0,
            ..InviteeRecord::default()
        };
        r.derive_ratio(Some("---"));
        assert_eq!(r.ratio_display, "∞");
        assert_eq!(r.ratio_health, RatioHealth::Excellent);
    }

    #[test]
    fn zero_traffic_is_neutral() {
        let mut r = InviteeRecord::default();
        r.derive_ratio(None);
        assert!(r.is_no_data);
        assert_eq!(r.ratio_health, RatioHealth::Neutral);
        assert_eq!(r.ratio_display, "0");
    }

    #[test]
    fn health_serializes_lowercase() {
        let json = serde_json::to_string(&RatioHealth::Excellent).unwrap_or_default();
        assert_eq!(json, "\"excellent\"");
        assert_eq!("warning".parse::<RatioHealth>().ok(), Some(RatioHealth::Warning));
    }
}
