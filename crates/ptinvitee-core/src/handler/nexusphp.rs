// ── Generic NexusPHP handler ──
//
// Fallback family. Quota comes from the `#info_block` header of the invite
// page, permission from the `type=new` send page, and the roster from the
// `border="1"` table, paged with a `page` query parameter.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use ptinvitee_api::SiteSession;

use super::{
    INFO_BLOCK_QUOTA_RE, PagedRoster, SiteHandler, blank_snapshot, columns, fetch_user_id,
    find_restriction, info_block_quota, url_matches, user_id_unavailable,
};
use crate::config::{RosterLimits, SiteConfig};
use crate::error::CoreError;
use crate::html::{Document, Element};
use crate::model::{Diagnosis, InviteStatus, InviteeRecord, SiteSnapshot};
use crate::roster::RosterFetcher;

/// Families with their own handler, or known not to be NexusPHP.
const EXCLUDED: &[&str] = &["m-team", "totheglory", "hdchina", "butterfly", "dmhy", "蝶粉"];

const FEATURES: &[&str] = &[
    "php",
    "nexus",
    "agsvpt",
    "audiences",
    "hdpt",
    "wintersakura",
    "hdmayi",
    "u2.dmhy",
    "hddolby",
    "hdarea",
    "pt.soulvoice",
    "ptsbao",
    "hdhome",
    "hdatmos",
    "1ptba",
    "keepfrds",
    "moecat",
    "springsunday",
];

const NO_TABLES_REASON: &str = "页面解析错误，可能未登录或者站点结构特殊";

lazy_static! {
    static ref SORRY_RE: Regex = Regex::new("(?i)对不起|sorry").expect("sorry regex");
}

/// Generic NexusPHP family, also the registry fallback.
#[derive(Debug, Clone, Default)]
pub struct NexusPhpHandler {
    limits: RosterLimits,
}

impl NexusPhpHandler {
    pub fn new(limits: RosterLimits) -> Self {
        Self { limits }
    }
}

fn parse_roster(doc: &Document, base: &url::Url) -> Vec<InviteeRecord> {
    columns::find_roster(doc, base, None)
}

fn has_takeinvite_form(doc: &Document) -> bool {
    doc.find(|e| e.is("form") && e.attr_contains("action", "takeinvite.php"))
        .is_some()
}

/// Quota and a first permission guess from the invite page itself.
fn apply_invite_page(doc: &Document, status: &mut InviteStatus) {
    if let Some((permanent, temporary)) = info_block_quota(doc, &INFO_BLOCK_QUOTA_RE) {
        status.permanent_count = permanent;
        status.temporary_count = temporary;
        if status.has_quota() {
            let reason = status.quota_reason();
            status.allow(reason);
        }
    }

    if let Some(hit) = find_restriction(&doc.text()) {
        status.restrict(format!("无法发送邀请: {hit}"));
    } else if has_takeinvite_form(doc) && !status.can_invite {
        status.allow("存在邀请表单，可以发送邀请");
    }
}

/// The send page has the final word: a `takeinvite.php` form means invites
/// can go out, a "sorry" notice explains why not.
fn apply_send_page(doc: &Document, status: &mut InviteStatus) {
    if has_takeinvite_form(doc) {
        status.allow("可以发送邀请");
        return;
    }
    let Some(anchor) = doc.element_with_text(&SORRY_RE) else {
        return;
    };
    let is_holder = |e: &Element<'_>| matches!(e.name(), "td" | "div" | "p" | "h2");
    let holder = if is_holder(&anchor) {
        Some(anchor)
    } else {
        anchor.closest(is_holder)
    };
    let Some(holder) = holder else {
        return;
    };
    let text = holder
        .closest(|e| e.is("table"))
        .map(|t| t.text())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| holder.text());
    status.restrict(text);
}

#[async_trait]
impl SiteHandler for NexusPhpHandler {
    fn name(&self) -> &'static str {
        "nexusphp"
    }

    fn matches(&self, site_url: &str) -> bool {
        !url_matches(site_url, EXCLUDED) && url_matches(site_url, FEATURES)
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

        let invite_path = format!("invite.php?id={uid}");
        let page = session.get(&invite_path).await?;
        let doc = Document::parse(&page.body);

        if doc.find(|e| e.is("table")).is_none() {
            snapshot
                .invite_status
                .fail(Diagnosis::PageUnrecognized, NO_TABLES_REASON);
            return Ok(snapshot);
        }
        apply_invite_page(&doc, &mut snapshot.invite_status);

        let first_page = parse_roster(&doc, session.base_url());
        let source = PagedRoster {
            session,
            path: invite_path,
            parse: parse_roster,
        };
        let outcome = RosterFetcher::new(self.limits)
            .collect(first_page, &source)
            .await?;
        info!(
            site = %site.name,
            count = outcome.invitees.len(),
            pages = outcome.pages_fetched,
            stop = %outcome.termination,
            "roster collected"
        );
        snapshot.invitees = outcome.invitees;

        let send = session.get(&format!("invite.php?id={uid}&type=new")).await?;
        apply_send_page(&Document::parse(&send.body), &mut snapshot.invite_status);

        snapshot.invite_status.ensure_reason();
        debug!(site = %site.name, reason = %snapshot.invite_status.reason, "invite status");
        Ok(snapshot)
    }
}
