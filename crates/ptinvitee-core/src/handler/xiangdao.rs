// ── XiangDao handler ──
//
// Quota sits in the user details page, permission in the invite form
// button, and the bonus shop sells both permanent and temporary invites.

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

const FEATURES: &[&str] = &["ptvicomo", "xiangdao"];

const CURRENCY: &str = "魔力";

const INVITE_ACTION: &str = "邀请其他人";

lazy_static! {
    static ref QUOTA_RE: Regex = Regex::new(r"(\d+)\s*\((\d+)\)").expect("quota regex");
    static ref DIGITS_RE: Regex = Regex::new(r"\d+").expect("digits regex");
    static ref BALANCE_RE: Regex =
        Regex::new(r"(\d+(?:,\d+)*(?:\.\d+)?)").expect("balance regex");
}

/// XiangDao family.
#[derive(Debug, Clone, Default)]
pub struct XiangDaoHandler {
    limits: RosterLimits,
}

impl XiangDaoHandler {
    pub fn new(limits: RosterLimits) -> Self {
        Self { limits }
    }
}

/// `(permanent, temporary)` from the `邀请` row of the user details table.
fn details_quota(doc: &Document) -> Option<(u32, u32)> {
    let head = doc.find(|e| e.is("td") && e.has_class("rowhead") && e.text().contains("邀请"))?;
    let value = head
        .following_siblings()
        .into_iter()
        .find(|s| s.is("td") && s.has_class("rowfollow"))?
        .text();
    if let Some(caps) = QUOTA_RE.captures(&value) {
        let permanent = caps[1].parse().unwrap_or(0);
        let temporary = caps[2].parse().unwrap_or(0);
        return Some((permanent, temporary));
    }
    let mut digits = DIGITS_RE
        .find_iter(&value)
        .filter_map(|m| m.as_str().parse::<u32>().ok());
    let permanent = digits.next()?;
    Some((permanent, digits.next().unwrap_or(0)))
}

fn apply_permission(doc: &Document, status: &mut InviteStatus) {
    let button = doc
        .find_all(|e| e.is("form") && e.attr_contains("action", "invite.php"))
        .iter()
        .find_map(|form| {
            form.find(|e| e.is("input") && e.attr("type") == Some("submit"))
        });
    let Some(button) = button else {
        status.fail(
            Diagnosis::PermissionUndetermined,
            "无法找到邀请按钮，请检查站点是否已登录",
        );
        return;
    };
    let value = button.attr("value").unwrap_or_default().trim();
    if value == INVITE_ACTION && !button.has_attr("disabled") {
        let reason = if status.has_quota() {
            status.quota_reason()
        } else {
            "可以邀请其他人".to_string()
        };
        status.allow(reason);
    } else {
        status.restrict(value);
    }
}

fn parse_roster(doc: &Document, base: &Url) -> Vec<InviteeRecord> {
    columns::find_roster(doc, base, Some("rowfollow"))
}

/// Balance plus `(permanent, temporary)` prices from `mybonus.php`.
fn bonus_shop(doc: &Document) -> (f64, f64, f64) {
    let balance_text = doc
        .find_all(|e| e.is("a") && e.attr("href") == Some("mybonus.php"))
        .iter()
        .find_map(|a| a.closest(|p| p.has_class("text")))
        .or_else(|| doc.find(|e| e.is("td") && e.has_class("text")))
        .map(|e| e.text())
        .unwrap_or_default();
    let balance = BALANCE_RE
        .captures(&balance_text)
        .and_then(|c| c[1].replace(',', "").parse().ok())
        .unwrap_or(0.0);

    let price_cell = |row: &Element<'_>| {
        row.find(|e| e.is("td") && e.has_class("rowfollow") && e.attr("align") == Some("center"))
            .and_then(|td| units::parse_amount(&td.text()))
    };
    let (mut permanent, mut temporary) = (0.0, 0.0);
    for row in doc.find_all(|e| e.is("tr")) {
        let text = row.text();
        if text.contains("临时邀请名额") {
            if let Some(price) = price_cell(&row) {
                temporary = price;
            }
        } else if text.contains("邀请名额") {
            if let Some(price) = price_cell(&row) {
                permanent = price;
            }
        }
    }
    (balance, permanent, temporary)
}

#[async_trait]
impl SiteHandler for XiangDaoHandler {
    fn name(&self) -> &'static str {
        "xiangdao"
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

        let details = session.get(&format!("userdetails.php?id={uid}")).await?;
        if let Some((permanent, temporary)) = details_quota(&Document::parse(&details.body)) {
            snapshot.invite_status.permanent_count = permanent;
            snapshot.invite_status.temporary_count = temporary;
        }

        let invite = session.get(&format!("invite.php?id={uid}")).await?;
        apply_permission(&Document::parse(&invite.body), &mut snapshot.invite_status);

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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn details_quota_with_temporary() {
        let doc = Document::parse(
            r#"<table><tr><td class="rowhead">邀请</td><td class="rowfollow">2 (3)</td></tr></table>"#,
        );
        assert_eq!(details_quota(&doc), Some((2, 3)));

        let doc = Document::parse(
            r#"<table><tr><td class="rowhead">邀请</td><td class="rowfollow">永久 1</td></tr></table>"#,
        );
        assert_eq!(details_quota(&doc), Some((1, 0)));
    }

    #[test]
    fn invite_button_text_decides() {
        let doc = Document::parse(
            r#"<form method="post" action="invite.php?id=5&type=new"><input type="submit" value="邀请其他人"></form>"#,
        );
        let mut status = InviteStatus {
            permanent_count: 1,
            ..InviteStatus::default()
        };
        apply_permission(&doc, &mut status);
        assert!(status.can_invite);
        assert_eq!(status.reason, "可用邀请数: 永久=1, 临时=0");

        let doc = Document::parse(
            r#"<form action="invite.php?id=5&type=new"><input type="submit" value="没有剩余邀请名额" disabled></form>"#,
        );
        let mut status = InviteStatus::default();
        apply_permission(&doc, &mut status);
        assert!(!status.can_invite);
        assert_eq!(status.reason, "没有剩余邀请名额");
    }

    #[test]
    fn missing_form_is_undetermined() {
        let mut status = InviteStatus::default();
        apply_permission(&Document::parse("<p>hi</p>"), &mut status);
        assert_eq!(status.diagnosis, Diagnosis::PermissionUndetermined);
    }

    #[test]
    fn bonus_shop_prices() {
        let doc = Document::parse(
            r#"<table><tr><td class="text">魔力值 [<a href="mybonus.php">使用</a>]: 52,300.5</td></tr></table>
            <table>
              <tr><td class="rowfollow">1</td><td class="rowfollow">邀请名额</td><td class="rowfollow" align="center">40,000</td></tr>
              <tr><td class="rowfollow">2</td><td class="rowfollow">临时邀请名额</td><td class="rowfollow" align="center">10,000</td></tr>
            </table>"#,
        );
        let (balance, permanent, temporary) = bonus_shop(&doc);
        assert!((balance - 52_300.5).abs() < 1e-6);
        assert!((permanent - 40_000.0).abs() < 1e-6);
        assert!((temporary - 10_000.0).abs() < 1e-6);
    }
}
