use std::fmt;

use serde::Serialize;

/// Why a single record was left out of a run. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NormalizationError {
    /// Neither a home/away pair nor a text body.
    MissingFields,
    /// A name field normalized to nothing (e.g. only punctuation).
    EmptyName { field: String, value: String },
    /// A timestamp value matched none of the recognized shapes.
    UnrecognizedTimestamp { value: String },
    /// Structured event with no usable timestamp and no league key to fall back on.
    NoTimeOrCategory,
    /// Record id already seen earlier in the same run.
    DuplicateRecordId,
}

impl NormalizationError {
    /// Short stable label, used as a summary bucket.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::EmptyName { .. } => "empty_name",
            Self::UnrecognizedTimestamp { .. } => "unrecognized_timestamp",
            Self::NoTimeOrCategory => "no_time_or_category",
            Self::DuplicateRecordId => "duplicate_record_id",
        }
    }
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFields => write!(f, "record has neither home/away names nor text"),
            Self::EmptyName { field, value } => {
                write!(f, "field '{field}' normalizes to an empty name: '{value}'")
            }
            Self::UnrecognizedTimestamp { value } => write!(f, "cannot parse timestamp '{value}'"),
            Self::NoTimeOrCategory => write!(f, "event has no usable timestamp and no league key"),
            Self::DuplicateRecordId => write!(f, "record id repeats an earlier record"),
        }
    }
}

impl std::error::Error for NormalizationError {}

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold, unknown source, etc.).
    ConfigValidation(String),
    /// A precedence list names a source that is not configured.
    UnknownSource(String),
    /// A source dump could not be read as the declared shape.
    SourceLoad { source_id: String, message: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownSource(msg) => write!(f, "unknown source: {msg}"),
            Self::SourceLoad { source_id, message } => {
                write!(f, "source '{source_id}': {message}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
