use std::collections::{BTreeMap, HashSet};

use chrono::Duration;
use serde::Deserialize;

use crate::error::ReconError;

pub const DEFAULT_WINDOW_SECS: u64 = 300;
pub const DEFAULT_THRESHOLD: f64 = 0.75;

// ---------------------------------------------------------------------------
// Precedence
// ---------------------------------------------------------------------------

/// Caller-ordered source ranking, with optional per-field overrides.
///
/// Sources missing from the applicable list rank after every listed source
/// and tie with each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Precedence {
    #[serde(default)]
    pub default: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Precedence {
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default: order.into_iter().map(Into::into).collect(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field<I, S>(mut self, field: &str, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(field.to_string(), order.into_iter().map(Into::into).collect());
        self
    }

    /// The ordering that applies to `field`.
    pub fn order_for(&self, field: &str) -> &[String] {
        self.fields.get(field).unwrap_or(&self.default)
    }

    /// 0 is highest. Unlisted sources share the lowest rank.
    pub fn rank(&self, field: &str, source_id: &str) -> usize {
        let order = self.order_for(field);
        order
            .iter()
            .position(|s| s == source_id)
            .unwrap_or(order.len())
    }

    fn lists(&self) -> impl Iterator<Item = (&str, &[String])> {
        std::iter::once(("default", self.default.as_slice()))
            .chain(self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice())))
    }
}

// ---------------------------------------------------------------------------
// Pipeline options
// ---------------------------------------------------------------------------

/// Everything `reconcile` needs besides the records. Passed explicitly per run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconOptions {
    /// Maximum start-time delta for two events to match (inclusive).
    pub window: Duration,
    /// Minimum text similarity at which two items are duplicates (inclusive).
    pub threshold: f64,
    pub precedence: Precedence,
    /// Sort free-text items newest-first before suppression.
    pub newest_first: bool,
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_WINDOW_SECS as i64),
            threshold: DEFAULT_THRESHOLD,
            precedence: Precedence::default(),
            newest_first: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Run config file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub newest_first: bool,
    #[serde(default)]
    pub precedence: Precedence,
    pub sources: Vec<SourceConfig>,
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub shape: ShapeKind,
    /// League key applied to records that carry none.
    #[serde(default)]
    pub league: Option<String>,
    /// Year for listing dates that omit one. Defaults to the current UTC year.
    #[serde(default)]
    pub year: Option<i32>,
}

/// Payload family a JSON dump holds. CSV dumps are always `raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Raw,
    FlashliveEvent,
    ScheduleGame,
    TvListing,
    SocialPost,
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::FlashliveEvent => write!(f, "flashlive_event"),
            Self::ScheduleGame => write!(f, "schedule_game"),
            Self::TvListing => write!(f, "tv_listing"),
            Self::SocialPost => write!(f, "social_post"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.sources.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least 1 source is required".into(),
            ));
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "source with file '{}' has an empty id",
                    source.file
                )));
            }
            if !ids.insert(source.id.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
        }

        // NaN fails both comparisons
        if !(self.threshold >= 0.0 && self.threshold <= 1.0) {
            return Err(ReconError::ConfigValidation(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }

        if window_duration(self.window_secs).is_none() {
            return Err(ReconError::ConfigValidation(format!(
                "window_secs out of range: {}",
                self.window_secs
            )));
        }

        for (list_name, order) in self.precedence.lists() {
            let mut seen = HashSet::new();
            for source_id in order {
                if !ids.contains(source_id.as_str()) {
                    return Err(ReconError::UnknownSource(format!(
                        "precedence '{list_name}' names '{source_id}'"
                    )));
                }
                if !seen.insert(source_id.as_str()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "precedence '{list_name}' lists '{source_id}' twice"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Pipeline options for this config. Call after `validate`.
    pub fn options(&self) -> ReconOptions {
        ReconOptions {
            window: window_duration(self.window_secs)
                .unwrap_or_else(|| Duration::seconds(DEFAULT_WINDOW_SECS as i64)),
            threshold: self.threshold,
            precedence: self.precedence.clone(),
            newest_first: self.newest_first,
        }
    }
}

fn window_duration(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
