use crate::model::{CanonicalRecord, Exclusion, ReconSummary, RecordKind};

/// Compute run counts from the pipeline output.
pub fn compute_summary(
    input_records: usize,
    records: &[CanonicalRecord],
    exclusions: &[Exclusion],
) -> ReconSummary {
    let mut summary = ReconSummary {
        input_records,
        processed: input_records.saturating_sub(exclusions.len()),
        excluded: exclusions.len(),
        canonical_records: records.len(),
        ..ReconSummary::default()
    };

    for r in records {
        let contributors = r.contributing_sources.len();
        match r.kind {
            RecordKind::Event => {
                summary.events += 1;
                if contributors > 1 {
                    summary.matched_groups += 1;
                } else {
                    summary.singletons += 1;
                }
                if r.start.is_none() {
                    summary.timestamp_unknown += 1;
                }
            }
            RecordKind::Text => {
                summary.texts += 1;
                summary.suppressed_duplicates += contributors.saturating_sub(1);
            }
        }
        if !r.conflicts.is_empty() {
            summary.conflicted_records += 1;
        }
    }

    for e in exclusions {
        *summary
            .exclusion_counts
            .entry(e.error.label().to_string())
            .or_insert(0) += 1;
    }

    summary
}
