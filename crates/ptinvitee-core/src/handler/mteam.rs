// ── M-Team handler ──
//
// The invite page is a client-rendered shell; everything the handler needs
// is in the `window.__INITIAL_STATE__` JSON blob it embeds.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use ptinvitee_api::SiteSession;

use super::{SiteHandler, blank_snapshot, columns, fetch_user_id, url_matches, user_id_unavailable};
use crate::config::{CredentialKind, SiteConfig};
use crate::error::CoreError;
use crate::model::{Diagnosis, InviteStatus, InviteeRecord, SiteSnapshot};
use crate::units;

const FEATURES: &[&str] = &["m-team", "pt.m-team", "kp.m-team"];

const STATE_MARKER: &str = "window.__INITIAL_STATE__";

/// The part of the embedded page state the handler reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InitialState {
    invite_quota: Option<InviteQuota>,
    invitees: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InviteQuota {
    permanent: Value,
    temporary: Value,
}

/// M-Team family. Authenticates with an API token pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct MTeamHandler;

/// Deserialize the first JSON value after `window.__INITIAL_STATE__ =`.
fn initial_state(html: &str) -> Option<Result<InitialState, serde_json::Error>> {
    let after_marker = &html[html.find(STATE_MARKER)? + STATE_MARKER.len()..];
    let rest = after_marker.trim_start().strip_prefix('=')?.trim_start();
    serde_json::Deserializer::from_str(rest)
        .into_iter::<InitialState>()
        .next()
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn count(v: &Value) -> u32 {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => units::parse_count(s),
        _ => 0,
    }
}

fn invitee(v: &Value, base: &Url) -> Option<InviteeRecord> {
    let field = |key: &str| v.get(key).unwrap_or(&Value::Null);
    let username = text(field("username"));
    if username.is_empty() {
        return None;
    }
    let status = text(field("status"));
    let uid = text(field("uid"));
    let mut record = InviteeRecord {
        username,
        profile_url: if uid.is_empty() {
            String::new()
        } else {
            columns::absolute_url(base, &format!("/profile/detail/{uid}"))
        },
        email: text(field("email")),
        enabled: !status.eq_ignore_ascii_case("disabled"),
        uploaded_bytes: number(field("uploaded")),
        downloaded_bytes: number(field("downloaded")),
        seeding_count: count(field("seedingCount")),
        seeding_size_bytes: number(field("seedingSize")),
        last_seed_report: text(field("lastSeedReport")),
        status_text: status,
        seed_magic: text(field("seedMagic")),
        seed_bonus: text(field("inviteeBonus")),
        ..InviteeRecord::default()
    };
    let ratio = text(field("ratio"));
    record.derive_ratio(Some(ratio.as_str()).filter(|r| !r.is_empty()));
    Some(record)
}

fn apply_state(state: &InitialState, base: &Url, snapshot: &mut SiteSnapshot) {
    let status: &mut InviteStatus = &mut snapshot.invite_status;
    if let Some(quota) = &state.invite_quota {
        status.permanent_count = count(&quota.permanent);
        status.temporary_count = count(&quota.temporary);
        if status.has_quota() {
            let reason = status.quota_reason();
            status.allow(reason);
        } else {
            status.restrict("当前没有可用邀请名额");
        }
    }
    snapshot.invitees = state
        .invitees
        .iter()
        .filter_map(|v| invitee(v, base))
        .collect();
}

#[async_trait]
impl SiteHandler for MTeamHandler {
    fn name(&self) -> &'static str {
        "mteam"
    }

    fn matches(&self, site_url: &str) -> bool {
        url_matches(site_url, FEATURES)
    }

    fn credential(&self) -> CredentialKind {
        CredentialKind::ApiToken
    }

    async fn parse_invite_page(
        &self,
        site: &SiteConfig,
        session: &SiteSession,
    ) -> Result<SiteSnapshot, CoreError> {
        let Some(uid) = fetch_user_id(session).await? else {
            return Ok(user_id_unavailable(site));
        };
        let mut snapshot = blank_snapshot(site);

        let page = session.get(&format!("invite.php?id={uid}")).await?;
        match initial_state(&page.body) {
            Some(Ok(state)) => apply_state(&state, session.base_url(), &mut snapshot),
            Some(Err(e)) => {
                debug!(site = %site.name, error = %e, "embedded state is not valid JSON");
                snapshot
                    .invite_status
                    .fail(Diagnosis::PageUnrecognized, format!("页面状态数据解析失败: {e}"));
                return Ok(snapshot);
            }
            None => {
                snapshot
                    .invite_status
                    .fail(Diagnosis::PageUnrecognized, "页面中未找到邀请数据");
                return Ok(snapshot);
            }
        }
        info!(site = %site.name, count = snapshot.invitees.len(), "roster collected");

        snapshot.invite_status.ensure_reason();
        Ok(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::RatioHealth;

    const PAGE: &str = r#"<html><script>
        window.__INITIAL_STATE__ = {"inviteQuota":{"permanent":1,"temporary":"2"},
          "invitees":[
            {"uid":101,"username":"alice","email":"a@x.org","uploaded":2147483648,"downloaded":1073741824,
             "ratio":"2.00","status":"confirmed","seedingCount":"7","seedingSize":1099511627776,
             "seedMagic":"1.250","inviteeBonus":"0.300","lastSeedReport":"2024-05-01 10:00:00"},
            {"uid":"102","username":"bob","uploaded":0,"downloaded":0,"status":"disabled"}
          ]};
        window.other = {};
    </script></html>"#;

    #[test]
    fn reads_quota_and_invitees() {
        let base = Url::parse("https://kp.m-team.cc/").unwrap();
        let state = initial_state(PAGE).unwrap().unwrap();
        let mut snapshot = SiteSnapshot::default();
        apply_state(&state, &base, &mut snapshot);

        let status = &snapshot.invite_status;
        assert!(status.can_invite);
        assert_eq!((status.permanent_count, status.temporary_count), (1, 2));

        assert_eq!(snapshot.invitees.len(), 2);
        let alice = &snapshot.invitees[0];
        assert_eq!(alice.profile_url, "https://kp.m-team.cc/profile/detail/101");
        assert_eq!(alice.seeding_count, 7);
        assert_eq!(alice.ratio_health, RatioHealth::Good);
        assert_eq!(alice.seed_bonus, "0.300");
        assert!(alice.enabled);

        let bob = &snapshot.invitees[1];
        assert!(!bob.enabled);
        assert!(bob.is_no_data);
        assert_eq!(bob.ratio_health, RatioHealth::Neutral);
    }

    #[test]
    fn zero_quota_restricts() {
        let html = r#"<script>window.__INITIAL_STATE__={"inviteQuota":{"permanent":0,"temporary":0}}</script>"#;
        let state = initial_state(html).unwrap().unwrap();
        let mut snapshot = SiteSnapshot::default();
        apply_state(&state, &Url::parse("https://m-team.cc/").unwrap(), &mut snapshot);
        assert!(!snapshot.invite_status.can_invite);
        assert_eq!(snapshot.invite_status.diagnosis, Diagnosis::Restricted);
    }

    #[test]
    fn missing_or_broken_state() {
        assert!(initial_state("<html>no state</html>").is_none());
        assert!(matches!(
            initial_state("window.__INITIAL_STATE__ = {broken"),
            Some(Err(_))
        ));
    }

    #[test]
    fn requires_token_pair() {
        assert_eq!(MTeamHandler.credential(), CredentialKind::ApiToken);
        assert!(MTeamHandler.matches("https://kp.m-team.cc/"));
    }
}
