use std::cmp::Reverse;
use std::collections::HashSet;

use log::{debug, info};

use crate::config::ReconOptions;
use crate::error::NormalizationError;
use crate::matcher::match_normalized;
use crate::model::{Exclusion, RawRecord, ReconMeta, ReconResult, RecordRef, SourceStream};
use crate::normalize::{normalize_record, NormalizedRecord};
use crate::resolve::{resolve, resolve_text};
use crate::summary::compute_summary;
use crate::suppress::collapse_duplicates;

/// Reconcile source streams into canonical records.
///
/// The first stream is authoritative: its events open the initial groups.
/// Each later stream is matched against the groups' anchor (first) records,
/// and its unmatched events open new groups for the streams after it.
/// Free-text items from every stream are pooled and suppressed together.
///
/// Never fails: records that cannot be normalized are reported under
/// `exclusions` and otherwise ignored.
pub fn reconcile(streams: &[SourceStream], options: &ReconOptions) -> ReconResult {
    let input_records: usize = streams.iter().map(|s| s.records.len()).sum();

    // Normalize
    let mut seen: HashSet<RecordRef> = HashSet::new();
    let mut exclusions = Vec::new();
    let mut normalized: Vec<Vec<NormalizedRecord<'_>>> = Vec::with_capacity(streams.len());

    for stream in streams {
        let mut accepted = Vec::with_capacity(stream.records.len());
        for raw in &stream.records {
            let outcome = if seen.insert(raw.key()) {
                normalize_record(raw)
            } else {
                Err(NormalizationError::DuplicateRecordId)
            };
            match outcome {
                Ok(n) => accepted.push(n),
                Err(error) => exclusions.push(exclude(raw, error)),
            }
        }
        normalized.push(accepted);
    }

    // Match events into groups
    let mut groups: Vec<Vec<&NormalizedRecord<'_>>> = Vec::new();
    for accepted in &normalized {
        let events: Vec<&NormalizedRecord<'_>> = accepted.iter().filter(|n| n.is_event()).collect();
        let anchors: Vec<&NormalizedRecord<'_>> = groups.iter().map(|g| g[0]).collect();

        let mut joined = vec![false; events.len()];
        for pair in match_normalized(&anchors, &events, options.window) {
            groups[pair.left].push(events[pair.right]);
            joined[pair.right] = true;
        }
        for (event, _) in events.iter().zip(&joined).filter(|(_, j)| !**j) {
            groups.push(vec![*event]);
        }
    }

    // Suppress free text
    let mut texts: Vec<&NormalizedRecord<'_>> = normalized
        .iter()
        .flatten()
        .filter(|n| !n.is_event())
        .collect();
    if options.newest_first {
        // Stable; None sorts last under Reverse.
        texts.sort_by_key(|n| Reverse(n.start));
    }
    let collapsed = collapse_duplicates(texts, options.threshold);

    // Resolve
    let records: Vec<_> = groups
        .iter()
        .map(|members| resolve(members, &options.precedence))
        .chain(
            collapsed
                .iter()
                .map(|c| resolve_text(c.kept, &c.duplicates)),
        )
        .collect();

    let summary = compute_summary(input_records, &records, &exclusions);
    info!(
        "reconciled {} records from {} sources: {} canonical ({} events, {} matched, {} texts, {} suppressed), {} excluded",
        summary.input_records,
        streams.len(),
        summary.canonical_records,
        summary.events,
        summary.matched_groups,
        summary.texts,
        summary.suppressed_duplicates,
        summary.excluded,
    );

    ReconResult {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            sources: streams.iter().map(|s| s.source_id.clone()).collect(),
            window_secs: options.window.num_seconds(),
            threshold: options.threshold,
            newest_first: options.newest_first,
        },
        summary,
        records,
        exclusions,
    }
}

fn exclude(raw: &RawRecord, error: NormalizationError) -> Exclusion {
    debug!("excluding {}: {error}", raw.key());
    Exclusion {
        source_id: raw.source_id.clone(),
        record_id: raw.record_id.clone(),
        error,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
