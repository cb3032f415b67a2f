// ── Butterfly (蝶粉) handler ──
//
// Traditional-Chinese NexusPHP fork. Everything lives on one unpaged
// invite page: quota in `#info_block`, the roster in the first bordered
// table, and a disabled button when the class is too low.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use ptinvitee_api::SiteSession;

use super::{
    SiteHandler, blank_snapshot, columns, fetch_user_id, info_block_quota, url_matches,
    user_id_unavailable,
};
use crate::config::SiteConfig;
use crate::error::CoreError;
use crate::html::Document;
use crate::model::{InviteStatus, SiteSnapshot};

const FEATURES: &[&str] = &["butterfly", "discfan", "dmhy"];

/// Text of the disabled invite button shown below the VIP class.
const CLASS_GATE: &str = "貴賓 或以上等級才可以";

lazy_static! {
    static ref QUOTA_RE: Regex =
        Regex::new(r"(?i)(?:邀请|邀請|探视权|invite).*?:?\s*(\d+)(?:\s*\((\d+)\))?")
            .expect("butterfly quota regex");
}

/// Butterfly family. Single-page roster.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButterflyHandler;

fn apply_invite_page(doc: &Document, status: &mut InviteStatus) {
    if let Some((permanent, temporary)) = info_block_quota(doc, &QUOTA_RE) {
        status.permanent_count = permanent;
        status.temporary_count = temporary;
        if status.has_quota() {
            let reason = status.quota_reason();
            status.allow(reason);
        }
    }

    let gate = doc.find(|e| {
        e.is("input") && e.has_attr("disabled") && e.attr_contains("value", CLASS_GATE)
    });
    if let Some(button) = gate {
        status.restrict(button.attr("value").unwrap_or(CLASS_GATE));
    }
}

#[async_trait]
impl SiteHandler for ButterflyHandler {
    fn name(&self) -> &'static str {
        "butterfly"
    }

    fn matches(&self, site_url: &str) -> bool {
        url_matches(site_url, FEATURES)
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
        let doc = Document::parse(&page.body);
        apply_invite_page(&doc, &mut snapshot.invite_status);

        snapshot.invitees = doc
            .find(|e| e.is("table") && e.attr("border") == Some("1"))
            .and_then(|table| columns::parse_table(&table, session.base_url(), Some("rowfollow")))
            .unwrap_or_default();
        info!(site = %site.name, count = snapshot.invitees.len(), "roster collected");

        snapshot.invite_status.ensure_reason();
        Ok(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Diagnosis;

    #[test]
    fn quota_then_class_gate() {
        let doc = Document::parse(
            r#"<div id="info_block"><span>邀請 [<a href="invite.php?id=8">發送</a>]: 1(0)</span></div>
            <form><input type="submit" value="貴賓 或以上等級才可以發送邀請" disabled></form>"#,
        );
        let mut status = InviteStatus::default();
        apply_invite_page(&doc, &mut status);
        assert_eq!(status.permanent_count, 1);
        assert!(!status.can_invite);
        assert_eq!(status.reason, "貴賓 或以上等級才可以發送邀請");
        assert_eq!(status.diagnosis, Diagnosis::Restricted);
    }

    #[test]
    fn quota_alone_allows() {
        let doc = Document::parse(
            r#"<div id="info_block"><span>探视权 [<a href="invite.php?id=8">发送</a>]: 2(1)</span></div>"#,
        );
        let mut status = InviteStatus::default();
        apply_invite_page(&doc, &mut status);
        assert!(status.can_invite);
        assert_eq!(status.reason, "可用邀请数: 永久=2, 临时=1");
    }

    #[test]
    fn matches_family_domains() {
        assert!(ButterflyHandler.matches("https://discfan.net/"));
        assert!(ButterflyHandler.matches("https://U2.DMHY.org/"));
        assert!(!ButterflyHandler.matches("https://springsunday.net/"));
    }
}
