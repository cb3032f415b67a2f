// ── Site-family handlers ──
//
// One `SiteHandler` per tracker family. A handler turns an authenticated
// `SiteSession` into a `SiteSnapshot`: invite permission and quota, the
// invitee roster (paged through `RosterFetcher`), and the bonus-shop
// balance where the family has one.

mod butterfly;
pub mod columns;
mod hdkylin;
mod hhclub;
mod mteam;
mod nexusphp;
mod registry;
mod xiangdao;

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

use ptinvitee_api::SiteSession;

use crate::config::{CredentialKind, SiteConfig};
use crate::error::CoreError;
use crate::html::Document;
use crate::model::{Diagnosis, InviteeRecord, SiteSnapshot};
use crate::roster::RosterSource;

pub use butterfly::ButterflyHandler;
pub use hdkylin::HdKylinHandler;
pub use hhclub::HhClubHandler;
pub use mteam::MTeamHandler;
pub use nexusphp::NexusPhpHandler;
pub use registry::HandlerRegistry;
pub use xiangdao::XiangDaoHandler;

/// The user-id lookup is a cheap page; fail fast when the site is down.
const USER_ID_TIMEOUT: Duration = Duration::from_secs(15);

const USER_ID_REASON: &str = "无法获取用户ID，请检查站点Cookie是否有效";

/// Ordered: the first pattern found in the page text names the restriction.
const RESTRICTION_PATTERNS: &[&str] = &[
    "没有邀请权限",
    "不能使用邀请",
    "当前没有可用邀请名额",
    "低于要求的等级",
    "需要更高的用户等级",
    "无法进行邀请注册",
    "当前账户上限数已到",
    "抱歉，目前没有开放注册",
    "当前邀请注册人数已达上限",
    "对不起",
    "只有.*?等级才能发送邀请",
    "及以上.*?才能发送邀请",
    r"\w+\s*or above can send invites",
];

lazy_static! {
    static ref USER_ID_RE: Regex = Regex::new(r"id=(\d+)").expect("user id regex");
    /// `邀请 [发送]: 3(1)` and its localized variants.
    pub(crate) static ref INFO_BLOCK_QUOTA_RE: Regex = Regex::new(
        r"(?i)(?:邀请|探视权|invite|邀請|查看权|查看權).*?(?:\[.*?\]|发送|查看).*?:?\s*(\d+)(?:\s*\((\d+)\))?"
    )
    .expect("info block regex");
    static ref TRAILING_QUOTA_RE: Regex =
        Regex::new(r":?\s*(\d+)(?:\s*\((\d+)\))?").expect("trailing quota regex");
    static ref RESTRICTIONS: Vec<Regex> = RESTRICTION_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("restriction regex"))
        .collect();
}

// ── Trait ────────────────────────────────────────────────────────────

/// Parser for one family of tracker sites.
#[async_trait]
pub trait SiteHandler: Send + Sync {
    /// Schema identifier of the family (`nexusphp`, `hhclub`, …).
    fn name(&self) -> &'static str;

    /// Whether this handler claims `site_url`. Pure and cheap.
    fn matches(&self, site_url: &str) -> bool;

    /// Credential the family needs before any request is made.
    fn credential(&self) -> CredentialKind {
        CredentialKind::Cookie
    }

    /// Fetch and parse everything the family exposes about invites.
    ///
    /// Transport failures, HTTP errors and logged-out pages are `Err`.
    /// `Ok` snapshots carry a [`Diagnosis`]; failure diagnoses are not
    /// persisted by the orchestrator.
    async fn parse_invite_page(
        &self,
        site: &SiteConfig,
        session: &SiteSession,
    ) -> Result<SiteSnapshot, CoreError>;
}

// ── Shared helpers ───────────────────────────────────────────────────

/// Case-insensitive substring match against a table of domain fragments.
pub(crate) fn url_matches(site_url: &str, fragments: &[&str]) -> bool {
    let lower = site_url.to_lowercase();
    fragments.iter().any(|f| lower.contains(f))
}

/// An empty snapshot for `site` to be filled in by a handler.
pub(crate) fn blank_snapshot(site: &SiteConfig) -> SiteSnapshot {
    SiteSnapshot {
        site_url: site.url.to_string(),
        ..SiteSnapshot::default()
    }
}

/// Snapshot for a site whose user id could not be determined.
pub(crate) fn user_id_unavailable(site: &SiteConfig) -> SiteSnapshot {
    let mut snapshot = blank_snapshot(site);
    snapshot
        .invite_status
        .fail(Diagnosis::UserIdUnavailable, USER_ID_REASON);
    snapshot
}

/// Read the logged-in user's id from `usercp.php`.
///
/// `Ok(None)` means the page loaded but carried no id-bearing link.
pub(crate) async fn fetch_user_id(session: &SiteSession) -> Result<Option<String>, CoreError> {
    let page = session
        .get_with_timeout("usercp.php", USER_ID_TIMEOUT)
        .await?;
    let id = user_id_from(&Document::parse(&page.body));
    debug!(user_id = ?id, "resolved user id");
    Ok(id)
}

/// User id from the first `userdetails.php` link, else the first
/// `invite.php` link.
pub(crate) fn user_id_from(doc: &Document) -> Option<String> {
    ["userdetails.php", "invite.php"].iter().find_map(|target| {
        let link = doc.find(|e| e.is("a") && e.attr_contains("href", target))?;
        USER_ID_RE
            .captures(link.attr("href")?)
            .map(|c| c[1].to_string())
    })
}

fn quota_from(caps: &Captures<'_>) -> (u32, u32) {
    let num = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    (num(1), num(2))
}

/// `(permanent, temporary)` invite counts from the `#info_block` header.
///
/// Matches `pattern` against the text around the invite link, then falls
/// back to the bare `: N(M)` following the link.
pub(crate) fn info_block_quota(doc: &Document, pattern: &Regex) -> Option<(u32, u32)> {
    let block = doc.by_id("info_block")?;
    let link = block.find(|e| e.is("a") && e.attr_contains("href", "invite.php"))?;
    let around = link.parent().map(|p| p.text()).unwrap_or_default();
    if let Some(caps) = pattern.captures(&around) {
        return Some(quota_from(&caps));
    }
    TRAILING_QUOTA_RE
        .captures(&link.trailing_text())
        .map(|caps| quota_from(&caps))
}

/// The first known restriction phrase found in `text`.
pub(crate) fn find_restriction(text: &str) -> Option<String> {
    RESTRICTIONS
        .iter()
        .find_map(|re| re.find(text).map(|m| m.as_str().to_string()))
}

// ── Page-parameter rosters ───────────────────────────────────────────

/// A roster served as `<path>&page=N`, parsed by `parse`.
pub(crate) struct PagedRoster<'s> {
    pub session: &'s SiteSession,
    pub path: String,
    pub parse: fn(&Document, &Url) -> Vec<InviteeRecord>,
}

#[async_trait]
impl RosterSource for PagedRoster<'_> {
    async fn fetch_page(&self, page_index: usize) -> Result<Vec<InviteeRecord>, CoreError> {
        let page = self
            .session
            .get(&format!("{}&page={page_index}", self.path))
            .await?;
        let doc = Document::parse(&page.body);
        Ok((self.parse)(&doc, self.session.base_url()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn user_id_prefers_userdetails_link() {
        let doc = Document::parse(
            r#"<a href="invite.php?id=7">邀请</a><a href="userdetails.php?id=42">me</a>"#,
        );
        assert_eq!(user_id_from(&doc).as_deref(), Some("42"));

        let doc = Document::parse(r#"<a href="invite.php?id=7">邀请</a>"#);
        assert_eq!(user_id_from(&doc).as_deref(), Some("7"));

        let doc = Document::parse("<p>please log in</p>");
        assert_eq!(user_id_from(&doc), None);
    }

    #[test]
    fn info_block_permanent_and_temporary() {
        let doc = Document::parse(
            r#"<div id="info_block"><span>欢迎 me 分享率: 2.1
            探视权 [<a href="invite.php?id=1">发送</a>]: 3(2)</span></div>"#,
        );
        assert_eq!(info_block_quota(&doc, &INFO_BLOCK_QUOTA_RE), Some((3, 2)));
    }

    #[test]
    fn info_block_permanent_only() {
        let doc = Document::parse(
            r#"<div id="info_block">邀请 [<a href="invite.php?id=1">发送</a>]: 0</div>"#,
        );
        assert_eq!(info_block_quota(&doc, &INFO_BLOCK_QUOTA_RE), Some((0, 0)));
    }

    #[test]
    fn info_block_trailing_fallback() {
        let doc = Document::parse(
            r#"<div id="info_block"><b><a href="invite.php?id=1">Inv</a></b>: 4 (1)</div>"#,
        );
        // "Inv" does not match the keyword pattern; the trailing text does.
        let strict = Regex::new(r"邀请\s*[:：]\s*(\d+)\s*\((\d+)\)").unwrap();
        assert_eq!(info_block_quota(&doc, &strict), None);

        let doc = Document::parse(
            r#"<div id="info_block"><a href="invite.php?id=1">Inv</a>: 4 (1)</div>"#,
        );
        assert_eq!(info_block_quota(&doc, &strict), Some((4, 1)));
    }

    #[test]
    fn restriction_phrases_in_order() {
        assert_eq!(
            find_restriction("对不起，当前没有可用邀请名额").as_deref(),
            Some("当前没有可用邀请名额")
        );
        assert_eq!(
            find_restriction("只有 Elite User 及以上等级才能发送邀请").as_deref(),
            Some("只有 Elite User 及以上等级才能发送邀请")
        );
        assert_eq!(
            find_restriction("Only Power User or above can send invites").as_deref(),
            Some("User or above can send invites")
        );
        assert_eq!(find_restriction("一切正常"), None);
    }

    #[test]
    fn url_fragments_are_case_insensitive() {
        assert!(url_matches("https://PT.M-Team.cc/", &["m-team"]));
        assert!(!url_matches("https://example.org/", &["m-team"]));
    }
}
