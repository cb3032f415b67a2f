//! Size and ratio arithmetic.
//!
//! Trackers render byte counts and share ratios as display strings in a
//! handful of locale conventions (`1,234.5 GB`, `1,5 GB`, `∞`, `Inf.`,
//! `---`). Everything here is total: malformed input yields `0`, never an
//! error, because empty placeholder cells are routine.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::model::RatioHealth;

/// Stand-in for an infinite ratio or size (nothing downloaded yet).
pub const INFINITE_SENTINEL: f64 = 1e20;

/// JSON has no infinity: overflowing values become the sentinel.
fn finite_or_sentinel(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else if value.is_nan() {
        0.0
    } else {
        INFINITE_SENTINEL.copysign(value)
    }
}

/// Ratios at or above this value are treated as infinite.
pub const SENTINEL_THRESHOLD: f64 = INFINITE_SENTINEL;

const PLACEHOLDERS: &[&str] = &["", "-", "--", "---", "—", "N/A", "n/a"];

lazy_static! {
    static ref SIZE_RE: Regex =
        Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)\s*([kmgtpezy]?)(i?)(b?)$").expect("size regex");
}

/// Empty-cell placeholders such as `---` or `—`.
pub fn is_placeholder(text: &str) -> bool {
    PLACEHOLDERS.contains(&text.trim())
}

fn is_infinite_text(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "inf" | "inf." | "∞" | "无限" | "無限")
}

/// Resolve `,` in a numeric string: a thousands separator (dropped) when it
/// sits between digits and is followed by exactly three digits, otherwise a
/// decimal point.
fn normalize_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        if c != ',' {
            out.push(c);
            continue;
        }
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_three = chars
            .get(i + 1..i + 4)
            .is_some_and(|w| w.iter().all(char::is_ascii_digit));
        let fourth_is_digit = chars.get(i + 4).is_some_and(char::is_ascii_digit);
        if prev_digit && next_three && !fourth_is_digit {
            continue;
        }
        out.push('.');
    }
    out
}

fn unit_multiplier(letter: &str) -> f64 {
    let exp = match letter.to_ascii_uppercase().as_str() {
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        "E" => 6,
        "Z" => 7,
        "Y" => 8,
        _ => 0,
    };
    1024_f64.powi(exp)
}

/// Parse a human-readable size (`"1.5 GiB"`, `"1,234.5 GB"`, `"512 K"`)
/// into bytes using binary multipliers.
pub fn parse_size(text: &str) -> f64 {
    let trimmed = text.trim();
    if PLACEHOLDERS.contains(&trimmed) {
        return 0.0;
    }
    if is_infinite_text(trimmed) {
        return INFINITE_SENTINEL;
    }

    let normalized = normalize_commas(trimmed);
    let Some(caps) = SIZE_RE.captures(&normalized) else {
        debug!(input = %text, "unparseable size string");
        return 0.0;
    };

    let value: f64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let letter = caps.get(2).map_or("", |m| m.as_str());
    finite_or_sentinel(value * unit_multiplier(letter))
}

/// Derive a display ratio and its numeric value from byte counts.
pub fn compute_ratio(uploaded: f64, downloaded: f64) -> (String, f64) {
    if downloaded <= 0.0 {
        return if uploaded > 0.0 {
            ("∞".into(), INFINITE_SENTINEL)
        } else {
            ("0".into(), 0.0)
        };
    }
    let ratio = uploaded / downloaded;
    if !ratio.is_finite() || ratio >= SENTINEL_THRESHOLD {
        return ("∞".into(), INFINITE_SENTINEL);
    }
    (format!("{ratio:.3}"), ratio)
}

/// Parse a ratio cell as displayed by the site.
///
/// Placeholders read as `0`; infinity markers read as the sentinel.
/// Returns `None` when the text is not a number at all.
pub fn parse_ratio_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if PLACEHOLDERS.contains(&trimmed) {
        return Some(0.0);
    }
    if is_infinite_text(trimmed) {
        return Some(INFINITE_SENTINEL);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Canonical display form of a ratio cell.
pub fn normalize_ratio_display(text: &str) -> String {
    let trimmed = text.trim();
    if PLACEHOLDERS.contains(&trimmed) {
        "0".into()
    } else if is_infinite_text(trimmed) {
        "∞".into()
    } else {
        trimmed.to_string()
    }
}

/// Both byte counts effectively zero: the member has no traffic to judge.
pub fn is_no_data(uploaded: f64, downloaded: f64) -> bool {
    uploaded.abs() < 1.0 && downloaded.abs() < 1.0
}

/// Map a ratio onto a health tier.
pub fn classify_ratio_health(value: f64, no_data: bool) -> RatioHealth {
    if no_data {
        RatioHealth::Neutral
    } else if value.is_nan() {
        RatioHealth::Unknown
    } else if value >= SENTINEL_THRESHOLD {
        RatioHealth::Excellent
    } else if value >= 1.0 {
        RatioHealth::Good
    } else if value >= 0.5 {
        RatioHealth::Warning
    } else {
        RatioHealth::Danger
    }
}

/// Render a byte count with two decimals (`B` … `PB`).
pub fn format_size(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes.max(0.0);
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

/// How many invites a balance buys at a given price.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn purchasable(balance: f64, price: f64) -> u64 {
    if price > 0.0 && balance > 0.0 {
        (balance / price).floor() as u64
    } else {
        0
    }
}

/// Parse a currency amount such as `"12,345.6"` or `"当前 8,000"`.
pub fn parse_amount(text: &str) -> Option<f64> {
    lazy_static! {
        static ref AMOUNT_RE: Regex =
            Regex::new(r"[0-9][0-9,]*(?:\.[0-9]+)?").expect("amount regex");
    }
    AMOUNT_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .map(finite_or_sentinel)
}

/// Leading integer of a count cell (`"1,024"`, `"12 (3)"`).
pub fn parse_count(text: &str) -> u32 {
    lazy_static! {
        static ref COUNT_RE: Regex = Regex::new(r"[0-9][0-9,]*").expect("count regex");
    }
    COUNT_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    #[test]
    fn sizes_with_binary_units() {
        assert!((parse_size("1.5 GB") - 1.5 * GIB).abs() < 1.0);
        assert!((parse_size("1.5gib") - 1.5 * GIB).abs() < 1.0);
        assert!((parse_size("2 KiB") - 2048.0).abs() < f64::EPSILON);
        assert!((parse_size("512 K") - 512.0 * 1024.0).abs() < f64::EPSILON);
        assert!((parse_size("100 B") - 100.0).abs() < f64::EPSILON);
        assert!((parse_size("1 YB") - 1024_f64.powi(8)).abs() < 1e9);
    }

    #[test]
    fn comma_as_thousands_separator() {
        assert!((parse_size("1,234.5 GB") - 1234.5 * GIB).abs() < 1.0);
        assert!((parse_size("1,234,567 B") - 1_234_567.0).abs() < f64::EPSILON);
    }

    #[test]
    fn comma_as_decimal_point() {
        assert!((parse_size("1,5 GB") - 1.5 * GIB).abs() < 1.0);
        assert!((parse_size("12,75 MB") - 12.75 * 1024.0 * 1024.0).abs() < 1.0);
    }

    #[test]
    fn infinity_and_garbage() {
        assert!(parse_size("∞") >= SENTINEL_THRESHOLD);
        assert!(parse_size("Inf.") >= SENTINEL_THRESHOLD);
        assert!(parse_size("inf") >= SENTINEL_THRESHOLD);
        assert!(parse_size("").abs() < f64::EPSILON);
        assert!(parse_size("—").abs() < f64::EPSILON);
        assert!(parse_size("abc").abs() < f64::EPSILON);
        assert!(parse_size("12 parsecs").abs() < f64::EPSILON);
    }

    #[test]
    fn overlong_digits_stay_finite() {
        let huge = format!("{} B", "9".repeat(400));
        assert!((parse_size(&huge) - INFINITE_SENTINEL).abs() < f64::EPSILON);
        let huge_gb = format!("{}.5 YB", "9".repeat(310));
        assert!(parse_size(&huge_gb).is_finite());
        assert_eq!(parse_amount(&"9".repeat(400)), Some(INFINITE_SENTINEL));

        let (display, value) = compute_ratio(f64::MAX, 1e-300);
        assert_eq!(display, "∞");
        assert!((value - INFINITE_SENTINEL).abs() < f64::EPSILON);
        let (_, value) = compute_ratio(f64::INFINITY, f64::INFINITY);
        assert!(value.is_finite());
    }

    #[test]
    fn ratio_from_bytes() {
        assert_eq!(compute_ratio(10.0, 0.0), ("∞".to_string(), INFINITE_SENTINEL));
        assert_eq!(compute_ratio(0.0, 0.0), ("0".to_string(), 0.0));
        let (display, value) = compute_ratio(3.0, 2.0);
        assert_eq!(display, "1.500");
        assert!((value - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_cells() {
        assert_eq!(parse_ratio_text("---"), Some(0.0));
        assert_eq!(parse_ratio_text("Inf."), Some(INFINITE_SENTINEL));
        assert_eq!(parse_ratio_text("无限"), Some(INFINITE_SENTINEL));
        assert_eq!(parse_ratio_text("0,75"), Some(0.75));
        assert_eq!(parse_ratio_text("2.031"), Some(2.031));
        assert_eq!(parse_ratio_text("n.a."), None);
        assert_eq!(parse_ratio_text("NaN"), None);
        assert_eq!(normalize_ratio_display("inf"), "∞");
        assert_eq!(normalize_ratio_display(""), "0");
    }

    #[test]
    fn health_tiers() {
        assert_eq!(classify_ratio_health(INFINITE_SENTINEL, false), RatioHealth::Excellent);
        assert_eq!(classify_ratio_health(1.0, false), RatioHealth::Good);
        assert_eq!(classify_ratio_health(0.999, false), RatioHealth::Warning);
        assert_eq!(classify_ratio_health(0.5, false), RatioHealth::Warning);
        assert_eq!(classify_ratio_health(0.49, false), RatioHealth::Danger);
        assert_eq!(classify_ratio_health(0.0, true), RatioHealth::Neutral);
        assert_eq!(classify_ratio_health(f64::NAN, false), RatioHealth::Unknown);
    }

    #[test]
    fn health_is_monotonic() {
        let samples = [0.0, 0.1, 0.49, 0.5, 0.7, 1.0, 3.0, 1e6, INFINITE_SENTINEL];
        for pair in samples.windows(2) {
            let lo = classify_ratio_health(pair[0], false);
            let hi = classify_ratio_health(pair[1], false);
            assert!(lo.rank() <= hi.rank(), "{} -> {lo:?}, {} -> {hi:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn no_data_detection() {
        assert!(is_no_data(0.0, 0.0));
        assert!(!is_no_data(0.0, 1024.0));
    }

    #[test]
    fn purchasable_invites() {
        assert_eq!(purchasable(25_000.0, 10_000.0), 2);
        assert_eq!(purchasable(9_999.0, 10_000.0), 0);
        assert_eq!(purchasable(25_000.0, 0.0), 0);
        assert_eq!(purchasable(0.0, 10_000.0), 0);
        assert_eq!(purchasable(-5.0, 1.0), 0);
    }

    #[test]
    fn amounts_and_formatting() {
        assert_eq!(parse_amount("当前 12,345.6 魔力"), Some(12_345.6));
        assert_eq!(parse_amount("none"), None);
        assert_eq!(parse_count("1,024"), 1024);
        assert_eq!(parse_count("12 (3)"), 12);
        assert_eq!(parse_count("---"), 0);
        assert_eq!(format_size(0.0), "0.00 B");
        assert_eq!(format_size(1536.0), "1.50 KB");
        assert_eq!(format_size(GIB), "1.00 GB");
    }
}
