use std::collections::BTreeSet;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use matchday_recon::config::{Precedence, ReconOptions};
use matchday_recon::model::{fields, RawRecord, RecordRef, SourceStream};
use matchday_recon::normalize::{normalize_name, normalize_record};
use matchday_recon::resolve::resolve;
use matchday_recon::similarity::lcs_ratio;
use matchday_recon::reconcile;

const TEAMS: [&str; 5] = ["Yankees", "NY Yankees", "Red Sox", "Boston Red Sox", "Mets"];
const POSTS: [&str; 4] = [
    "Yankees win 5-3 over Red Sox",
    "Yankees win 5-3 over the Red Sox",
    "Mets lose again",
    "Mets lose again!",
];

/// (home, away, minute offset) for events, or a post index when `home` is 5.
type Row = (usize, usize, i64);

fn to_record(source: &str, index: usize, (home, away, minute): Row) -> RawRecord {
    let base = Utc.with_ymd_and_hms(2025, 6, 11, 23, 0, 0).unwrap();
    let at = (base + Duration::minutes(minute)).to_rfc3339();
    if home == TEAMS.len() {
        return RawRecord::new(source, index.to_string())
            .with_field(fields::TEXT, POSTS[away % POSTS.len()])
            .with_field(fields::PUBLISHED_AT, at);
    }
    RawRecord::new(source, index.to_string())
        .with_field(fields::HOME, TEAMS[home])
        .with_field(fields::AWAY, TEAMS[away % TEAMS.len()])
        .with_field(fields::START_TIME, at)
}

fn streams_strategy() -> impl Strategy<Value = Vec<SourceStream>> {
    let row = (0..=TEAMS.len(), 0..TEAMS.len(), 0i64..20);
    prop::collection::vec(prop::collection::vec(row, 0..8), 1..4).prop_map(|streams| {
        streams
            .into_iter()
            .enumerate()
            .map(|(si, rows)| {
                let source = format!("s{si}");
                let records = rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| to_record(&source, i, row))
                    .collect();
                SourceStream::new(source, records)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn normalize_name_is_idempotent(s in "[A-Za-z0-9 .,'éèüñÉ&@-]{0,40}") {
        let once = normalize_name(&s);
        prop_assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn lcs_ratio_is_symmetric_and_bounded(a in "[a-e ]{0,12}", b in "[a-e ]{0,12}") {
        let r = lcs_ratio(&a, &b);
        prop_assert!((0.0..=1.0).contains(&r));
        prop_assert_eq!(r, lcs_ratio(&b, &a));
        prop_assert_eq!(lcs_ratio(&a, &a), 1.0);
    }

    #[test]
    fn every_accepted_record_lands_in_exactly_one_output(streams in streams_strategy()) {
        let result = reconcile(&streams, &ReconOptions::default());

        let excluded: BTreeSet<RecordRef> = result
            .exclusions
            .iter()
            .map(|e| RecordRef { source_id: e.source_id.clone(), record_id: e.record_id.clone() })
            .collect();
        let accepted: BTreeSet<RecordRef> = streams
            .iter()
            .flat_map(|s| s.records.iter().map(RawRecord::key))
            .filter(|k| !excluded.contains(k))
            .collect();

        let contributed: Vec<RecordRef> = result
            .records
            .iter()
            .flat_map(|r| r.contributing_sources.iter().cloned())
            .collect();
        let unique: BTreeSet<RecordRef> = contributed.iter().cloned().collect();

        prop_assert_eq!(unique.len(), contributed.len());
        prop_assert_eq!(unique, accepted);
        prop_assert_eq!(result.summary.processed + result.summary.excluded, result.summary.input_records);
    }

    #[test]
    fn reconciling_output_again_keeps_fields(streams in streams_strategy()) {
        let options = ReconOptions::default();
        let first = reconcile(&streams, &options);
        let again = SourceStream::new(
            "canonical",
            first.records.iter().map(|r| r.to_raw("canonical")).collect(),
        );
        let second = reconcile(&[again], &options);

        prop_assert_eq!(first.records.len(), second.records.len());
        for (a, b) in first.records.iter().zip(&second.records) {
            prop_assert_eq!(&a.fields, &b.fields);
        }
    }

    #[test]
    fn merge_ignores_member_order(
        rows in prop::collection::vec((0..TEAMS.len(), 0..TEAMS.len(), 0i64..5), 1..5),
        order in Just(vec!["s2", "s0"]).prop_shuffle(),
    ) {
        let records: Vec<RawRecord> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| to_record(&format!("s{}", i % 3), i, *row))
            .collect();
        let normalized: Vec<_> = records.iter().filter_map(|r| normalize_record(r).ok()).collect();
        let forward: Vec<_> = normalized.iter().collect();
        let backward: Vec<_> = normalized.iter().rev().collect();
        let precedence = Precedence::new(order);

        prop_assert_eq!(resolve(&forward, &precedence), resolve(&backward, &precedence));
    }
}
