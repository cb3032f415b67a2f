// ── HHClub handler ──
//
// Tailwind front-end: quota lives in the home page user panel, the roster
// is a stack of CSS-grid rows, and invites are priced in 憨豆 at the bonus
// shop. No temporary invites.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;
use url::Url;

use ptinvitee_api::SiteSession;

use super::{
    PagedRoster, SiteHandler, blank_snapshot, columns, fetch_user_id, url_matches,
    user_id_unavailable,
};
use crate::config::{RosterLimits, SiteConfig};
use crate::error::CoreError;
use crate::html::{Document, Element};
use crate::model::{Diagnosis, InviteStatus, InviteeRecord, SiteSnapshot};
use crate::roster::RosterFetcher;
use crate::units;

const FEATURES: &[&str] = &["hhanclub", "hhclub", "hhan"];

const CURRENCY: &str = "憨豆";

const NO_INVITEES: &str = "没有被邀者";

/// Button texts that carry a class requirement rather than an action.
const BUTTON_RESTRICTIONS: &[&str] = &["才可以发送邀请", "才能发送邀请", "等级才可", "及以上"];

lazy_static! {
    static ref PANEL_QUOTA_RE: Regex = Regex::new(r"\[邀请\]:\s*(\d+)").expect("panel quota regex");
    static ref SORRY_RE: Regex = Regex::new("对不起").expect("sorry regex");
    static ref CLASS_GATE_RE: Regex =
        Regex::new("只有.*及以上的用户才能发送邀请").expect("class gate regex");
    static ref LEVEL_HINT_RES: Vec<Regex> = ["维护开发员.*及以上", "等级才可以", "才能发送邀请"]
        .iter()
        .map(|p| Regex::new(p).expect("level hint regex"))
        .collect();
}

/// HHClub family.
#[derive(Debug, Clone, Default)]
pub struct HhClubHandler {
    limits: RosterLimits,
}

impl HhClubHandler {
    pub fn new(limits: RosterLimits) -> Self {
        Self { limits }
    }
}

/// Permanent invite count from the `#user-info-panel` on the home page.
fn panel_quota(doc: &Document) -> Option<u32> {
    let panel = doc.by_id("user-info-panel")?;
    PANEL_QUOTA_RE
        .captures(&panel.text())
        .and_then(|c| c[1].parse().ok())
}

fn is_div(e: &Element<'_>) -> bool {
    e.is("div")
}

/// Permission from the invite page.
fn apply_permission(doc: &Document, status: &mut InviteStatus) {
    if let Some(sorry) = doc.element_with_text(&SORRY_RE) {
        let sorry_div = if is_div(&sorry) {
            Some(sorry)
        } else {
            sorry.closest(is_div)
        };
        let detail = doc
            .find(|e| e.is("div") && e.has_class("bg-[#FFFFFF]"))
            .or_else(|| sorry_div.and_then(|d| d.next_sibling()))
            .map(|d| d.text())
            .filter(|t| !t.is_empty());
        status.restrict(detail.unwrap_or_else(|| "该账号暂无邀请权限".into()));
        return;
    }

    if let Some(gate) = doc.element_with_text(&CLASS_GATE_RE) {
        status.restrict(gate.text());
        return;
    }

    let button = doc.find(|e| {
        e.is("input") && e.attr("type") == Some("submit") && e.attr_contains("value", "邀请")
    });
    if let Some(button) = button {
        let value = button.attr("value").unwrap_or_default();
        if BUTTON_RESTRICTIONS.iter().any(|p| value.contains(p))
            || button.has_attr("disabled")
            || button.has_class("hidden")
        {
            status.restrict(value);
        } else {
            status.allow("可以邀请其他人");
        }
        return;
    }

    if let Some(hint) = LEVEL_HINT_RES
        .iter()
        .find_map(|re| doc.element_with_text(re))
    {
        status.restrict(hint.text());
        return;
    }

    status.fail(
        Diagnosis::PermissionUndetermined,
        "无法找到邀请按钮，请检查站点是否已登录",
    );
}

fn parse_roster(doc: &Document, base: &Url) -> Vec<InviteeRecord> {
    if doc.text().contains(NO_INVITEES) {
        return Vec::new();
    }
    columns::parse_grid(doc, base)
}

/// Balance and permanent invite price from `mybonus.php`.
fn bonus_shop(doc: &Document) -> (f64, f64) {
    let bold = |e: &Element<'_>| e.is("div") && e.has_class("text-base") && e.has_class("font-bold");
    let balance = doc
        .find(|e| bold(e) && !e.has_class("text-[#F29D38]"))
        .or_else(|| doc.find(bold))
        .and_then(|e| units::parse_amount(&e.text()))
        .unwrap_or(0.0);

    let price = doc
        .find_all(|e| e.is("div") && e.text().contains("邀请名额"))
        .iter()
        .find_map(|div| {
            div.following_siblings()
                .into_iter()
                .find(|s| s.is("div") && s.has_class("break-all"))
                .and_then(|s| units::parse_amount(&s.text()))
        })
        .unwrap_or(0.0);

    (balance, price)
}

#[async_trait]
impl SiteHandler for HhClubHandler {
    fn name(&self) -> &'static str {
        "hhclub"
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
        let status = &mut snapshot.invite_status;

        let home = session.get("index.php").await?;
        status.permanent_count = panel_quota(&Document::parse(&home.body)).unwrap_or(0);
        status.temporary_count = 0;

        let invite = session.get(&format!("invite.php?id={uid}")).await?;
        apply_permission(&Document::parse(&invite.body), status);
        if status.can_invite && status.permanent_count > 0 {
            status.reason = status.quota_reason();
        }

        let roster_path = format!("invite.php?id={uid}&menu=invitee");
        let first = session.get(&roster_path).await?;
        let first_page = parse_roster(&Document::parse(&first.body), session.base_url());
        let source = PagedRoster {
            session,
            path: roster_path,
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
        let (bonus, price) = bonus_shop(&Document::parse(&shop.body));
        let status = &mut snapshot.invite_status;
        status.bonus = bonus;
        status.permanent_invite_price = price;
        status.temporary_invite_price = 0.0;
        status.append_purchase_hint(CURRENCY);

        status.ensure_reason();
        Ok(snapshot)
    }
}
