//! `matchday-recon`: cross-source fixture and post reconciliation.
//!
//! Pure engine crate: receives pre-loaded source streams, returns canonical
//! records plus a run summary. No CLI or IO dependencies.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod resolve;
pub mod similarity;
pub mod summary;
pub mod suppress;

pub use adapter::{load_csv_records, load_json_records, load_source, DumpFormat, SourcePayload};
pub use config::{Precedence, ReconConfig, ReconOptions, ShapeKind, SourceConfig};
pub use engine::reconcile;
pub use error::{NormalizationError, ReconError};
pub use matcher::{find_matches, MatchPair};
pub use model::{CanonicalRecord, FieldValue, RawRecord, ReconResult, RecordKind, SourceStream};
pub use normalize::{normalize_name, normalize_record, normalize_text, normalize_timestamp};
pub use suppress::suppress_duplicates;
