// ── Header-driven roster rows ──
//
// Every HTML family renders its roster as a header row followed by data
// rows, either `<table>` rows or CSS-grid `<div>` rows. Columns are located
// by header keyword, never by position.

use std::collections::HashSet;

use url::Url;

use crate::html::{Document, Element};
use crate::model::InviteeRecord;
use crate::units;

/// A roster column the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteeField {
    Username,
    Email,
    Enabled,
    Status,
    Uploaded,
    Downloaded,
    Ratio,
    SeedingSize,
    SeedMagic,
    LastSeedReport,
    SeedingCount,
    SeedBonus,
}

/// Header keywords per field, checked top to bottom. The first hit wins, so
/// longer phrases ("seeding size", "seed magic") sit above the bare "seed".
const HEADER_SYNONYMS: &[(InviteeField, &[&str])] = &[
    (InviteeField::Username, &["用户名", "用戶名", "username", "名字", "user"]),
    (InviteeField::Email, &["邮箱", "郵箱", "电子邮件", "email", "mail"]),
    (InviteeField::Enabled, &["启用", "啟用", "enabled"]),
    (InviteeField::Status, &["状态", "狀態", "status"]),
    (InviteeField::Uploaded, &["上传", "上傳", "uploaded", "upload"]),
    (InviteeField::Downloaded, &["下载", "下載", "downloaded", "download"]),
    (InviteeField::Ratio, &["分享率", "分享比率", "分享", "ratio"]),
    (
        InviteeField::SeedingSize,
        &["做种体积", "做種體積", "seeding size", "seed size"],
    ),
    (
        InviteeField::SeedMagic,
        &[
            "做种时魔",
            "做種時魔",
            "纯做种时魔",
            "純做種時魔",
            "做种积分",
            "seed magic",
            "seed bonus",
        ],
    ),
    (
        InviteeField::LastSeedReport,
        &["最后做种", "最後做種", "last seed"],
    ),
    (
        InviteeField::SeedingCount,
        &["做种数", "做種數", "seeding", "seeds", "seed"],
    ),
    (
        InviteeField::SeedBonus,
        &["后宫加成", "後宮加成", "invitee bonus", "bonus"],
    ),
];

/// Columns that would otherwise be caught by a broader keyword.
const IGNORED_HEADERS: &[&str] = &["做种时间", "做種時間", "seed time"];

/// At least one of these must appear in the header row of a roster.
const ROSTER_HEADER_KEYWORDS: &[&str] = &["用户名", "用戶名", "邮箱", "email", "分享率", "ratio", "username"];

const BANNED_ROW_CLASSES: &[&str] = &["rowbanned", "banned", "disabled"];

/// Rows with fewer cells are spacers or colspan notices.
const MIN_CELLS: usize = 3;

impl InviteeField {
    /// Map a header cell to a field.
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.to_lowercase();
        if IGNORED_HEADERS.iter().any(|k| header.contains(k)) {
            return None;
        }
        HEADER_SYNONYMS
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| header.contains(k)))
            .map(|(field, _)| *field)
    }
}

/// Whether a header row belongs to an invitee roster.
pub fn looks_like_roster(headers: &[String]) -> bool {
    let joined = headers.join(" ").to_lowercase();
    ROSTER_HEADER_KEYWORDS.iter().any(|k| joined.contains(k))
}

/// `"no"`, `否`, `禁…`, `disabled`, `banned`.
pub fn is_disabled_marker(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower == "no" || ["否", "禁", "disabled", "banned"].iter().any(|m| lower.contains(m))
}

fn row_is_banned(row: &Element<'_>) -> bool {
    BANNED_ROW_CLASSES.iter().any(|c| row.has_class(c))
        || row
            .find(|e| {
                e.is("img")
                    && (e.has_class("disabled")
                        || e.attr("alt") == Some("Disabled")
                        || e.attr_contains("src", "disabled"))
            })
            .is_some()
}

/// Resolve a profile link against the site base.
pub fn absolute_url(base: &Url, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    base.join(href)
        .map_or_else(|_| href.to_string(), String::from)
}

// ── Row conversion ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RowValues {
    username: String,
    profile_href: String,
    email: String,
    uploaded: String,
    downloaded: String,
    ratio: Option<String>,
    seeding: String,
    seeding_size: String,
    seed_magic: String,
    seed_bonus: String,
    last_seed_report: String,
    status: Option<String>,
    banned: bool,
}

impl RowValues {
    fn set(&mut self, field: InviteeField, cell: &Element<'_>) {
        let text = cell.text();
        match field {
            InviteeField::Username => {
                if let Some(link) = cell.find(|e| e.is("a")) {
                    self.username = link.text();
                    self.profile_href = link.attr("href").unwrap_or_default().to_string();
                } else {
                    self.username = text;
                }
            }
            InviteeField::Email => self.email = text,
            InviteeField::Enabled => {
                if is_disabled_marker(&text) {
                    self.banned = true;
                }
            }
            InviteeField::Status => {
                if is_disabled_marker(&text) {
                    self.banned = true;
                }
                self.status = Some(text);
            }
            InviteeField::Uploaded => self.uploaded = text,
            InviteeField::Downloaded => self.downloaded = text,
            InviteeField::Ratio => self.ratio = Some(text),
            InviteeField::SeedingSize => self.seeding_size = text,
            InviteeField::SeedMagic => self.seed_magic = text,
            InviteeField::LastSeedReport => self.last_seed_report = text,
            InviteeField::SeedingCount => self.seeding = text,
            InviteeField::SeedBonus => self.seed_bonus = text,
        }
    }

    fn into_record(self, base: &Url) -> Option<InviteeRecord> {
        if self.username.is_empty() {
            return None;
        }
        let status_text = match self.status {
            Some(s) if !s.is_empty() => s,
            _ if self.banned => "已禁用".into(),
            _ => "已确认".into(),
        };
        let mut record = InviteeRecord {
            profile_url: absolute_url(base, &self.profile_href),
            username: self.username,
            email: self.email,
            enabled: !self.banned,
            uploaded_bytes: units::parse_size(&self.uploaded),
            downloaded_bytes: units::parse_size(&self.downloaded),
            seeding_count: units::parse_count(&self.seeding),
            seeding_size_bytes: units::parse_size(&self.seeding_size),
            last_seed_report: self.last_seed_report,
            status_text,
            seed_magic: self.seed_magic,
            seed_bonus: self.seed_bonus,
            ..InviteeRecord::default()
        };
        record.derive_ratio(self.ratio.as_deref());
        Some(record)
    }
}

/// Convert one data row. An unlabelled first column is the username.
pub fn parse_row(
    fields: &[Option<InviteeField>],
    row: &Element<'_>,
    cells: &[Element<'_>],
    base: &Url,
) -> Option<InviteeRecord> {
    let mut values = RowValues {
        banned: row_is_banned(row),
        ..RowValues::default()
    };
    for (idx, (field, cell)) in fields.iter().zip(cells).enumerate() {
        match field {
            Some(f) => values.set(*f, cell),
            None if idx == 0 => values.set(InviteeField::Username, cell),
            None => {}
        }
    }
    values.into_record(base)
}

fn dedupe(records: Vec<InviteeRecord>) -> Vec<InviteeRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.identity().to_string()))
        .collect()
}

// ── Tables ───────────────────────────────────────────────────────────

/// Rows owned by `table` itself, not by a nested table.
pub fn table_rows<'a>(table: &Element<'a>) -> Vec<Element<'a>> {
    table.find_all(|e| e.is("tr") && e.closest(|p| p.is("table")).as_ref() == Some(table))
}

pub fn row_cells<'a>(row: &Element<'a>) -> Vec<Element<'a>> {
    row.children().filter(|c| c.is("td") || c.is("th")).collect()
}

/// Parse a roster `<table>` whose first row is the header.
///
/// Returns `None` when the header row does not look like a roster. With
/// `row_class`, only rows carrying that class are data rows.
pub fn parse_table(
    table: &Element<'_>,
    base: &Url,
    row_class: Option<&str>,
) -> Option<Vec<InviteeRecord>> {
    let rows = table_rows(table);
    let (header, data) = rows.split_first()?;
    let headers: Vec<String> = row_cells(header).iter().map(Element::text).collect();
    if !looks_like_roster(&headers) {
        return None;
    }
    let fields: Vec<_> = headers.iter().map(|h| InviteeField::from_header(h)).collect();

    let records = data
        .iter()
        .filter(|row| row_class.is_none_or(|c| row.has_class(c)))
        .filter_map(|row| {
            let cells = row_cells(row);
            if cells.len() < MIN_CELLS {
                return None;
            }
            parse_row(&fields, row, &cells, base)
        })
        .collect();
    Some(dedupe(records))
}

/// Candidate roster tables: `border="1"` tables first, otherwise any table
/// with more than two rows.
pub fn roster_tables(doc: &Document) -> Vec<Element<'_>> {
    let bordered = doc.find_all(|e| e.is("table") && e.attr("border") == Some("1"));
    if !bordered.is_empty() {
        return bordered;
    }
    doc.find_all(|e| e.is("table") && table_rows(e).len() > 2)
}

/// The first candidate table yielding invitees, or an empty roster.
pub fn find_roster(doc: &Document, base: &Url, row_class: Option<&str>) -> Vec<InviteeRecord> {
    roster_tables(doc)
        .iter()
        .filter_map(|t| parse_table(t, base, row_class))
        .find(|records| !records.is_empty())
        .unwrap_or_default()
}

// ── CSS grid rows ────────────────────────────────────────────────────

/// Parse a roster laid out as `<div class="grid grid-cols-N">` rows.
///
/// The header row is the first grid row with a background class, falling
/// back to the first grid row. Its siblings are the data rows.
pub fn parse_grid(doc: &Document, base: &Url) -> Vec<InviteeRecord> {
    let is_grid = |e: &Element<'_>| e.is("div") && e.class_contains("grid-cols-");
    let header = doc
        .find(|e| is_grid(e) && e.class_contains("bg-"))
        .or_else(|| doc.find(is_grid));
    let Some(container) = header.and_then(|h| h.parent()) else {
        return Vec::new();
    };

    let rows: Vec<_> = container.children().filter(is_grid).collect();
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let fields: Vec<_> = header
        .children()
        .map(|c| InviteeField::from_header(&c.text()))
        .collect();
    if fields.is_empty() {
        return Vec::new();
    }

    let records = data
        .iter()
        .filter_map(|row| {
            let cells: Vec<_> = row.children().collect();
            if cells.len() < fields.len() {
                return None;
            }
            parse_row(&fields, row, &cells, base)
        })
        .collect();
    dedupe(records)
}
