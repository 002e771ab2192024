use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NormalizationError;

/// Semantic field names adapters map their payloads onto.
pub mod fields {
    pub const LEAGUE: &str = "league";
    pub const HOME: &str = "home";
    pub const AWAY: &str = "away";
    pub const START_TIME: &str = "start_time";
    pub const DATE: &str = "date";
    pub const TIME: &str = "time";
    pub const SCORE: &str = "score";
    pub const SCORE_HOME: &str = "score_home";
    pub const SCORE_AWAY: &str = "score_away";
    pub const STATUS: &str = "status";
    pub const CHANNEL: &str = "channel";
    pub const TEXT: &str = "text";
    pub const LINK: &str = "link";
    pub const AUTHOR: &str = "author";
    pub const PUBLISHED_AT: &str = "published_at";
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A single field value as an adapter produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Null, blank text, and lists with no non-blank entry count as absent.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Int(_) => false,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Best-effort conversion from arbitrary JSON. Objects have no field
    /// representation and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Text(b.to_string())),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Text(n.to_string()),
            }),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Some(Self::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            )),
            Value::Object(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Reference to one input record: `{source_id}/{record_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordRef {
    pub source_id: String,
    pub record_id: String,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.record_id)
    }
}

/// One adapter's unnormalized view of an entity occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: String,
    pub record_id: String,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl RawRecord {
    pub fn new(source_id: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            record_id: record_id.into(),
            fields: BTreeMap::new(),
            fetched_at: None,
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    /// Non-empty value of `name`, if any.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_empty())
    }

    /// Non-blank text value of `name`, if any.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_text)
    }

    pub fn key(&self) -> RecordRef {
        RecordRef {
            source_id: self.source_id.clone(),
            record_id: self.record_id.clone(),
        }
    }
}

/// All records one source contributed to a run.
#[derive(Debug, Clone)]
pub struct SourceStream {
    pub source_id: String,
    pub records: Vec<RawRecord>,
}

impl SourceStream {
    /// Stamps `source_id` onto every record so provenance always names the stream.
    pub fn new(source_id: impl Into<String>, records: Vec<RawRecord>) -> Self {
        let source_id = source_id.into();
        let records = records
            .into_iter()
            .map(|mut r| {
                r.source_id = source_id.clone();
                r
            })
            .collect();
        Self { source_id, records }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Event,
    Text,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => write!(f, "event"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// One contender for a field whose top-precedence sources disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCandidate {
    pub source_id: String,
    pub record_id: String,
    pub value: FieldValue,
}

/// The pipeline's merged, deduplicated output unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    /// Smallest record key among the contributors.
    pub id: String,
    pub kind: RecordKind,
    pub fields: BTreeMap<String, FieldValue>,
    /// Instant parsed from the contributing timestamps, highest precedence first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicts: BTreeMap<String, Vec<FieldCandidate>>,
    pub contributing_sources: Vec<RecordRef>,
}

impl CanonicalRecord {
    /// Re-expresses this record as input from `source_id`, keyed by its id.
    pub fn to_raw(&self, source_id: &str) -> RawRecord {
        RawRecord {
            source_id: source_id.to_string(),
            record_id: self.id.clone(),
            fields: self.fields.clone(),
            fetched_at: None,
        }
    }
}

/// A record left out of the run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub source_id: String,
    pub record_id: String,
    pub error: NormalizationError,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub input_records: usize,
    pub processed: usize,
    pub excluded: usize,
    pub canonical_records: usize,
    pub events: usize,
    pub matched_groups: usize,
    pub singletons: usize,
    pub texts: usize,
    pub suppressed_duplicates: usize,
    pub conflicted_records: usize,
    pub timestamp_unknown: usize,
    pub exclusion_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub sources: Vec<String>,
    pub window_secs: i64,
    pub threshold: f64,
    pub newest_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub records: Vec<CanonicalRecord>,
    pub exclusions: Vec<Exclusion>,
}
