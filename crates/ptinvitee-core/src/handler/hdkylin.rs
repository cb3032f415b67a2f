// ── HDKylin (麒麟) handler ──

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use ptinvitee_api::SiteSession;

use super::{
    INFO_BLOCK_QUOTA_RE, PagedRoster, SiteHandler, blank_snapshot, columns, fetch_user_id,
    info_block_quota, url_matches, user_id_unavailable,
};
use crate::config::{RosterLimits, SiteConfig};
use crate::error::CoreError;
use crate::html::Document;
use crate::model::{Diagnosis, InviteStatus, InviteeRecord, SiteSnapshot};
use crate::roster::RosterFetcher;
use crate::units;

const FEATURES: &[&str] = &["hdkyl.in"];

const CURRENCY: &str = "魔力";

const NO_INVITEES: &str = "没有被邀者";

lazy_static! {
    static ref USER_ID_RE: Regex = Regex::new(r"id=(\d+)").expect("user id regex");
    static ref QUOTA_RE: Regex =
        Regex::new(r"邀请\s*[:：]\s*(\d+)\s*\((\d+)\)").expect("kylin quota regex");
    static ref BALANCE_RE: Regex = Regex::new(r"当前([\d,\.]+)").expect("balance regex");
}

/// HDKylin family.
#[derive(Debug, Clone, Default)]
pub struct HdKylinHandler {
    limits: RosterLimits,
}

impl HdKylinHandler {
    pub fn new(limits: RosterLimits) -> Self {
        Self { limits }
    }
}

/// User id from the invite link in the home page header.
fn header_user_id(doc: &Document) -> Option<String> {
    let link = doc
        .by_id("info_block")?
        .find(|e| e.is("a") && e.attr_contains("href", "invite.php?id="))?;
    USER_ID_RE
        .captures(link.attr("href")?)
        .map(|c| c[1].to_string())
}

fn header_quota(doc: &Document) -> Option<(u32, u32)> {
    let block = doc.by_id("info_block")?;
    if let Some(caps) = QUOTA_RE.captures(&block.text()) {
        return Some((caps[1].parse().unwrap_or(0), caps[2].parse().unwrap_or(0)));
    }
    info_block_quota(doc, &INFO_BLOCK_QUOTA_RE)
}

fn apply_permission(doc: &Document, status: &mut InviteStatus) {
    let Some(nav) = doc.by_id("invitenav") else {
        status.fail(
            Diagnosis::PermissionUndetermined,
            "无法找到邀请导航栏 (#invitenav)",
        );
        return;
    };
    let button = nav
        .find_all(|e| e.is("form") && e.attr_contains("action", "invite.php"))
        .iter()
        .find_map(|form| form.find(|e| e.is("input") && e.attr("type") == Some("submit")));
    match button {
        Some(b) if b.has_attr("disabled") => {
            status.restrict(b.attr("value").unwrap_or("邀请权限不足（未知原因）"));
        }
        Some(_) => status.allow("可以发送邀请"),
        None => status.fail(Diagnosis::PermissionUndetermined, "无法找到邀请按钮"),
    }
}

fn parse_roster(doc: &Document, base: &Url) -> Vec<InviteeRecord> {
    let empty = doc
        .find_all(|e| e.is("table") && e.attr("border") == Some("1"))
        .iter()
        .any(|t| t.text().contains(NO_INVITEES));
    if empty {
        return Vec::new();
    }
    columns::find_roster(doc, base, None)
}

/// Balance plus `(permanent, temporary)` prices from `mybonus.php`.
fn bonus_shop(doc: &Document) -> (f64, f64, f64) {
    let balance_text = doc
        .find(|e| {
            e.is("td") && {
                let t = e.text();
                t.contains("用你的魔力值") && t.contains("当前")
            }
        })
        .map_or_else(|| doc.text(), |td| td.text());
    let balance = BALANCE_RE
        .captures(&balance_text)
        .and_then(|c| c[1].replace(',', "").parse().ok())
        .unwrap_or(0.0);

    let (mut permanent, mut temporary) = (0.0, 0.0);
    if let Some(shop) = doc.find(|e| e.is("table") && e.attr("border") == Some("1")) {
        for row in columns::table_rows(&shop) {
            let cells: Vec<_> = row.children().filter(|c| c.is("td")).collect();
            if cells.len() < 4 {
                continue;
            }
            let item = cells[1].text();
            let Some(price) = units::parse_amount(&cells[2].text()) else {
                continue;
            };
            if item.contains("临时邀请名额") {
                temporary = price;
            } else if item.contains("邀请名额") {
                permanent = price;
            }
        }
    }
    (balance, permanent, temporary)
}

#[async_trait]
impl SiteHandler for HdKylinHandler {
    fn name(&self) -> &'static str {
        "hdkylin"
    }

    fn matches(&self, site_url: &str) -> bool {
        url_matches(site_url, FEATURES)
    }

    async fn parse_invite_page(
        &self,
        site: &SiteConfig,
        session: &SiteSession,
    ) -> Result<SiteSnapshot, CoreError> {
        let home = session.get("index.php").await?;
        let home_doc = Document::parse(&home.body);
        let uid = match header_user_id(&home_doc) {
            Some(uid) => Some(uid),
            None => fetch_user_id(session).await?,
        };
        let Some(uid) = uid else {
            return Ok(user_id_unavailable(site));
        };
        debug!(site = %site.name, uid = %uid, "user id");
        let mut snapshot = blank_snapshot(site);

        let invite_path = format!("invite.php?id={uid}");
        let invite = session.get(&invite_path).await?;
        let doc = Document::parse(&invite.body);

        let quota = header_quota(&home_doc).or_else(|| header_quota(&doc));
        if let Some((permanent, temporary)) = quota {
            snapshot.invite_status.permanent_count = permanent;
            snapshot.invite_status.temporary_count = temporary;
        }
        apply_permission(&doc, &mut snapshot.invite_status);

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
            stop = %outcome.termination,
            "roster collected"
        );
        snapshot.invitees = outcome.invitees;

        let shop = session.get("mybonus.php").await?;
        let (bonus, permanent, temporary) = bonus_shop(&Document::parse(&shop.body));
        let status = &mut snapshot.invite_status;
        status.bonus = bonus;
        status.permanent_invite_price = permanent;
        status.temporary_invite_price = temporary;
        status.append_purchase_hint(CURRENCY);

        status.ensure_reason();
        Ok(snapshot)
    }
}
