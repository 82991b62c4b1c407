//! Deterministic delivery codes.
//!
//! Derives the short code printed on labels and shown in the admin console,
//! `CHLV–YYMMDD-XXXX`, from an internal id and the order's creation date.
//! The backend and the console must produce byte-identical codes for the
//! same input, so the transform depends on nothing but its arguments (and
//! today's UTC date when no usable creation date is given).

#![warn(missing_docs)]

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Code prefix
pub const PREFIX: &str = "CHLV";

/// Separator between prefix and date (EN DASH, U+2013)
pub const PREFIX_SEPARATOR: char = '\u{2013}';

const SUFFIX_LEN: usize = 4;
const SUFFIX_PAD: char = '0';

/// Creation date as received from callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    /// An instant with the offset it was recorded in; its date is the one
    /// written at that offset, matching the text path
    Timestamp(DateTime<FixedOffset>),
    /// A calendar date
    Date(NaiveDate),
    /// Free text: ISO 8601, or `dd/mm/yyyy`, `yyyy-mm-dd` and similar
    Text(String),
}

impl From<DateTime<Utc>> for CreatedAt {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for CreatedAt {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDate> for CreatedAt {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<&str> for CreatedAt {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CreatedAt {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl CreatedAt {
    /// Calendar date this value denotes, if it can be resolved
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Timestamp(ts) => Some(ts.date_naive()),
            Self::Date(date) => Some(*date),
            Self::Text(text) => parse_date_text(text),
        }
    }
}

/// Format a delivery code using today's UTC date as the fallback.
///
/// ```
/// use fleetline_delivery_id::format_delivery_id;
///
/// assert_eq!(
///     format_delivery_id(Some("abc123"), Some(&"2024-12-11".into())),
///     "CHLV\u{2013}241211-C123"
/// );
/// ```
pub fn format_delivery_id(raw_id: Option<&str>, created_at: Option<&CreatedAt>) -> String {
    format_delivery_id_on(raw_id, created_at, Utc::now().date_naive())
}

/// Format a delivery code, substituting `today` for a missing or unparsable date.
pub fn format_delivery_id_on(
    raw_id: Option<&str>,
    created_at: Option<&CreatedAt>,
    today: NaiveDate,
) -> String {
    let date = created_at.and_then(CreatedAt::to_date).unwrap_or(today);
    format!(
        "{PREFIX}{PREFIX_SEPARATOR}{}-{}",
        date.format("%y%m%d"),
        suffix(raw_id)
    )
}

fn suffix(raw_id: Option<&str>) -> String {
    let cleaned: Vec<char> = raw_id
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() >= SUFFIX_LEN {
        cleaned[cleaned.len() - SUFFIX_LEN..].iter().collect()
    } else {
        let mut padded: String = cleaned.into_iter().collect();
        while padded.len() < SUFFIX_LEN {
            padded.push(SUFFIX_PAD);
        }
        padded
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Offset-qualified timestamps keep the calendar date written in the string.
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.date_naive());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(ts.date());
        }
    }

    parse_delimited(text)
}

/// `yyyy-mm-dd`, `yyyy/mm/dd`, `dd/mm/yyyy`, `dd-mm-yy`, ...: a 4-digit first
/// token means year first, anything else means day first.
fn parse_delimited(text: &str) -> Option<NaiveDate> {
    let mut tokens = text.split(['/', '-', '.']).map(leading_digits);
    let first = tokens.next()?;
    let second = tokens.next()?;
    let third = tokens.next()?;
    if first.is_empty() || second.is_empty() || third.is_empty() {
        return None;
    }

    let (year, month, day) = if first.len() == 4 {
        (first, second, third)
    } else {
        (third, second, first)
    };

    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn leading_digits(token: &str) -> &str {
    let token = token.trim();
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    &token[..end]
}
