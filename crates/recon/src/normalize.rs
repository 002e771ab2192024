//! Field normalization: names, free text, timestamps, and whole records.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::NormalizationError;
use crate::model::{fields, FieldValue, RawRecord};

/// Zone-less ISO-8601 layouts, read as UTC.
const NAIVE_ISO_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Listing-site date + time layouts, read as UTC.
const LOCALE_FORMATS: [&str; 6] = [
    "%d %b %Y %I:%M %p",
    "%d %b %Y %H:%M",
    "%b %d %Y %I:%M %p",
    "%b %d %Y %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%a %d %b %Y %I:%M %p",
];

// ---------------------------------------------------------------------------
// Names + text
// ---------------------------------------------------------------------------

/// Canonical comparison form of a team or account name.
///
/// Diacritics are folded, everything is lowercased, periods and apostrophes
/// vanish ("St." -> "st"), any other punctuation or whitespace run becomes a
/// single space. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        for lower in ch.to_lowercase() {
            if is_combining_mark(lower) {
                continue;
            }
            if lower.is_alphanumeric() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(lower);
            } else if !matches!(lower, '.' | '\'' | '\u{2019}' | '`') {
                pending_space = true;
            }
        }
    }

    out
}

/// Lowercase, whitespace-collapsed form of a free-text item.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// The shapes a source may hand us a start time in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTimestamp<'a> {
    /// ISO-8601 / RFC 3339, an all-digit epoch string, or a one-string
    /// locale date and time.
    Text(&'a str),
    /// Unix epoch seconds.
    Epoch(i64),
    /// Separate locale-formatted date and time strings.
    DateTime { date: &'a str, time: &'a str },
}

pub fn normalize_timestamp(raw: RawTimestamp<'_>) -> Result<DateTime<Utc>, NormalizationError> {
    match raw {
        RawTimestamp::Epoch(secs) => from_epoch(secs, &secs.to_string()),
        RawTimestamp::Text(s) => parse_text_timestamp(s.trim()),
        RawTimestamp::DateTime { date, time } => {
            let joined = format!("{} {}", date.trim(), time.trim());
            parse_locale(&joined).ok_or(NormalizationError::UnrecognizedTimestamp { value: joined })
        }
    }
}

fn unrecognized(value: &str) -> NormalizationError {
    NormalizationError::UnrecognizedTimestamp {
        value: value.to_string(),
    }
}

fn from_epoch(secs: i64, original: &str) -> Result<DateTime<Utc>, NormalizationError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| unrecognized(original))
}

fn parse_text_timestamp(s: &str) -> Result<DateTime<Utc>, NormalizationError> {
    if s.is_empty() {
        return Err(unrecognized(s));
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = s.parse().map_err(|_| unrecognized(s))?;
        return from_epoch(secs, s);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    // A bare trailing "Z" on a layout RFC 3339 rejects, e.g. no seconds.
    let naive_input = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_ISO_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_input, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    parse_locale(s).ok_or_else(|| unrecognized(s))
}

fn parse_locale(s: &str) -> Option<DateTime<Utc>> {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    LOCALE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(&collapsed, fmt)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Comparison key. Derived per run, never used as identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedKey {
    Event {
        home: String,
        away: String,
        /// Start rounded down to the minute.
        start_minute: Option<DateTime<Utc>>,
    },
    Text { text: String },
}

/// A raw record plus everything the matcher and suppressor compare on.
#[derive(Debug, Clone)]
pub struct NormalizedRecord<'a> {
    pub raw: &'a RawRecord,
    pub key: NormalizedKey,
    pub start: Option<DateTime<Utc>>,
    /// League key, compared opaquely after name normalization.
    pub category: Option<String>,
}

impl NormalizedRecord<'_> {
    pub fn is_event(&self) -> bool {
        matches!(self.key, NormalizedKey::Event { .. })
    }
}

pub fn normalize_record(raw: &RawRecord) -> Result<NormalizedRecord<'_>, NormalizationError> {
    let category = raw
        .text(fields::LEAGUE)
        .map(normalize_name)
        .filter(|c| !c.is_empty());

    if let (Some(home), Some(away)) = (raw.text(fields::HOME), raw.text(fields::AWAY)) {
        let home = canonical_name(fields::HOME, home)?;
        let away = canonical_name(fields::AWAY, away)?;

        let start = match record_timestamp(raw, &[fields::START_TIME]) {
            Some(Ok(ts)) => Some(ts),
            Some(Err(err)) if category.is_some() => {
                debug!("{}: {err}; falling back to league key", raw.key());
                None
            }
            Some(Err(err)) => return Err(err),
            None => None,
        };
        if start.is_none() && category.is_none() {
            return Err(NormalizationError::NoTimeOrCategory);
        }

        return Ok(NormalizedRecord {
            raw,
            key: NormalizedKey::Event {
                home,
                away,
                start_minute: start.map(truncate_to_minute),
            },
            start,
            category,
        });
    }

    if let Some(text) = raw.text(fields::TEXT) {
        let start = record_timestamp(raw, &[fields::PUBLISHED_AT, fields::START_TIME])
            .and_then(Result::ok);
        return Ok(NormalizedRecord {
            raw,
            key: NormalizedKey::Text {
                text: normalize_text(text),
            },
            start,
            category,
        });
    }

    Err(NormalizationError::MissingFields)
}

fn canonical_name(field: &str, value: &str) -> Result<String, NormalizationError> {
    let name = normalize_name(value);
    if name.is_empty() {
        return Err(NormalizationError::EmptyName {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(name)
}

/// First present timestamp among `names`, then the date + time pair.
/// `None` means the record carries no timestamp at all.
fn record_timestamp(
    raw: &RawRecord,
    names: &[&str],
) -> Option<Result<DateTime<Utc>, NormalizationError>> {
    for name in names {
        if let Some(value) = raw.field(name) {
            return Some(match value {
                FieldValue::Int(secs) => normalize_timestamp(RawTimestamp::Epoch(*secs)),
                FieldValue::Text(s) => normalize_timestamp(RawTimestamp::Text(s)),
                other => Err(unrecognized(&other.to_string())),
            });
        }
    }

    match (raw.text(fields::DATE), raw.text(fields::TIME)) {
        (Some(date), Some(time)) => Some(normalize_timestamp(RawTimestamp::DateTime { date, time })),
        _ => None,
    }
}

fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(ts)
}
