use std::collections::{BTreeMap, BTreeSet};

use crate::config::Precedence;
use crate::matcher::MatchPair;
use crate::model::{fields, CanonicalRecord, FieldCandidate, FieldValue, RecordKind, RecordRef};
use crate::normalize::NormalizedRecord;

/// Merge a matched group of event records into one canonical record.
///
/// Each field comes from the highest-ranked member holding a non-empty value
/// for it. Members are ordered by (rank, source_id, record_id), so the result
/// does not depend on the order `members` arrives in. When two or more
/// top-ranked members disagree, every top-ranked value is kept under
/// `conflicts`, winner first.
pub fn resolve(members: &[&NormalizedRecord<'_>], precedence: &Precedence) -> CanonicalRecord {
    let field_names: BTreeSet<&str> = members
        .iter()
        .flat_map(|m| m.raw.fields.keys().map(String::as_str))
        .collect();

    let mut merged = BTreeMap::new();
    let mut conflicts = BTreeMap::new();

    for field in field_names {
        let ranked = ranked_holders(members, field, precedence);
        let Some(&(top_rank, winner, value)) = ranked.first() else {
            continue;
        };
        merged.insert(field.to_string(), value.clone());

        let peers: Vec<_> = ranked.iter().take_while(|(r, _, _)| *r == top_rank).collect();
        if peers.iter().any(|(_, _, v)| *v != value) {
            let candidates = peers
                .iter()
                .map(|(_, m, v)| FieldCandidate {
                    source_id: m.raw.source_id.clone(),
                    record_id: m.raw.record_id.clone(),
                    value: (*v).clone(),
                })
                .collect();
            log::debug!("{field}: equal-precedence conflict in group led by {}", winner.raw.key());
            conflicts.insert(field.to_string(), candidates);
        }
    }

    // Derived instant, following the start_time ordering.
    let mut by_start: Vec<&NormalizedRecord<'_>> = members.to_vec();
    by_start.sort_by(|a, b| {
        let ra = precedence.rank(fields::START_TIME, &a.raw.source_id);
        let rb = precedence.rank(fields::START_TIME, &b.raw.source_id);
        ra.cmp(&rb).then_with(|| a.raw.key().cmp(&b.raw.key()))
    });
    let start = by_start.iter().find_map(|m| m.start);

    canonical(RecordKind::Event, merged, start, conflicts, members)
}

/// Convenience for a single matched pair from `find_matches`/`match_normalized`.
pub fn resolve_pair(
    pair: &MatchPair,
    left: &[&NormalizedRecord<'_>],
    right: &[&NormalizedRecord<'_>],
    precedence: &Precedence,
) -> CanonicalRecord {
    resolve(&[left[pair.left], right[pair.right]], precedence)
}

/// Canonical record for a kept free-text item. Fields come from the kept item
/// alone; suppressed duplicates only add provenance.
pub fn resolve_text(
    kept: &NormalizedRecord<'_>,
    duplicates: &[&NormalizedRecord<'_>],
) -> CanonicalRecord {
    let mut members = Vec::with_capacity(duplicates.len() + 1);
    members.push(kept);
    members.extend_from_slice(duplicates);

    let merged = kept
        .raw
        .fields
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    canonical(RecordKind::Text, merged, kept.start, BTreeMap::new(), &members)
}

/// Members holding a non-empty `field`, best first.
fn ranked_holders<'m, 'r>(
    members: &'m [&'m NormalizedRecord<'r>],
    field: &str,
    precedence: &Precedence,
) -> Vec<(usize, &'m NormalizedRecord<'r>, &'m FieldValue)> {
    let mut ranked: Vec<_> = members
        .iter()
        .filter_map(|m| {
            m.raw
                .field(field)
                .map(|v| (precedence.rank(field, &m.raw.source_id), *m, v))
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.raw.key().cmp(&b.1.raw.key())));
    ranked
}

fn canonical(
    kind: RecordKind,
    fields: BTreeMap<String, FieldValue>,
    start: Option<chrono::DateTime<chrono::Utc>>,
    conflicts: BTreeMap<String, Vec<FieldCandidate>>,
    members: &[&NormalizedRecord<'_>],
) -> CanonicalRecord {
    let mut contributing_sources: Vec<RecordRef> = members.iter().map(|m| m.raw.key()).collect();
    contributing_sources.sort();
    let id = contributing_sources
        .first()
        .map(ToString::to_string)
        .unwrap_or_default();

    CanonicalRecord {
        id,
        kind,
        fields,
        start,
        conflicts,
        contributing_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawRecord;
    use crate::normalize::normalize_record;

    fn api_game() -> RawRecord {
        RawRecord::new("api", "745123")
            .with_field(fields::HOME, "Yankees")
            .with_field(fields::AWAY, "Red Sox")
            .with_field(fields::START_TIME, "2025-06-11T23:05:00Z")
            .with_field(fields::STATUS, "Scheduled")
            .with_field(fields::CHANNEL, "")
    }

    fn tv_game() -> RawRecord {
        RawRecord::new("tv", "3")
            .with_field(fields::HOME, "NY Yankees")
            .with_field(fields::AWAY, "Boston Red Sox")
            .with_field(fields::START_TIME, "2025-06-11T23:07:00Z")
            .with_field(fields::CHANNEL, "ESPN")
    }

    #[test]
    fn precedence_picks_fields() {
        let (api, tv) = (api_game(), tv_game());
        let (a, t) = (normalize_record(&api).unwrap(), normalize_record(&tv).unwrap());
        let p = Precedence::new(["api", "tv"]);

        let rec = resolve(&[&a, &t], &p);
        assert_eq!(rec.kind, RecordKind::Event);
        assert_eq!(rec.fields[fields::HOME], FieldValue::from("Yankees"));
        assert_eq!(rec.fields[fields::CHANNEL], FieldValue::from("ESPN"));
        assert_eq!(rec.fields[fields::STATUS], FieldValue::from("Scheduled"));
        assert_eq!(rec.start, a.start);
        assert!(rec.conflicts.is_empty());
        assert_eq!(rec.id, "api/745123");
        assert_eq!(rec.contributing_sources.len(), 2);
    }

    #[test]
    fn per_field_override() {
        let (api, tv) = (api_game().with_field(fields::CHANNEL, "YES"), tv_game());
        let (a, t) = (normalize_record(&api).unwrap(), normalize_record(&tv).unwrap());
        let p = Precedence::new(["api", "tv"]).with_field(fields::CHANNEL, ["tv", "api"]);

        let rec = resolve(&[&a, &t], &p);
        assert_eq!(rec.fields[fields::CHANNEL], FieldValue::from("ESPN"));
        assert_eq!(rec.fields[fields::HOME], FieldValue::from("Yankees"));
        assert_eq!(rec.fields[fields::START_TIME], FieldValue::from("2025-06-11T23:05:00Z"));
    }

    #[test]
    fn missing_fields_are_omitted() {
        let (api, tv) = (api_game(), tv_game());
        let (a, t) = (normalize_record(&api).unwrap(), normalize_record(&tv).unwrap());
        let rec = resolve(&[&a, &t], &Precedence::new(["api", "tv"]));
        assert!(!rec.fields.contains_key(fields::SCORE));
        assert!(!rec.fields.contains_key(fields::LINK));
    }

    #[test]
    fn equal_precedence_conflicts_are_recorded() {
        let (api, tv) = (api_game(), tv_game());
        let (a, t) = (normalize_record(&api).unwrap(), normalize_record(&tv).unwrap());

        // Neither source listed: both tie at the lowest rank.
        let rec = resolve(&[&t, &a], &Precedence::default());
        assert_eq!(rec.fields[fields::HOME], FieldValue::from("Yankees"));
        let home = &rec.conflicts[fields::HOME];
        assert_eq!(home.len(), 2);
        assert_eq!(home[0].source_id, "api");
        assert_eq!(home[1].value, FieldValue::from("NY Yankees"));
        // Only tv has a channel: nothing to conflict with.
        assert!(!rec.conflicts.contains_key(fields::CHANNEL));
    }

    #[test]
    fn input_order_does_not_matter() {
        let (api, tv) = (api_game(), tv_game());
        let (a, t) = (normalize_record(&api).unwrap(), normalize_record(&tv).unwrap());
        for p in [Precedence::default(), Precedence::new(["tv"]), Precedence::new(["api", "tv"])] {
            assert_eq!(resolve(&[&a, &t], &p), resolve(&[&t, &a], &p));
        }
    }

    #[test]
    fn resolve_pair_uses_indices() {
        let (api, tv) = (api_game(), tv_game());
        let (a, t) = (normalize_record(&api).unwrap(), normalize_record(&tv).unwrap());
        let pair = MatchPair { left: 0, right: 0, score: 0.7, delta: None };
        let rec = resolve_pair(&pair, &[&a], &[&t], &Precedence::new(["tv"]));
        assert_eq!(rec.fields[fields::HOME], FieldValue::from("NY Yankees"));
        assert_eq!(rec.start, t.start);
    }

    #[test]
    fn text_record_keeps_survivor_fields() {
        let kept = RawRecord::new("x", "p1")
            .with_field(fields::TEXT, "Yankees win 5-3")
            .with_field(fields::LINK, "https://x.example/1");
        let dup = RawRecord::new("reddit", "p9")
            .with_field(fields::TEXT, "yankees win 5-3!")
            .with_field(fields::AUTHOR, "fan42");
        let (k, d) = (normalize_record(&kept).unwrap(), normalize_record(&dup).unwrap());

        let rec = resolve_text(&k, &[&d]);
        assert_eq!(rec.kind, RecordKind::Text);
        assert_eq!(rec.fields.len(), 2);
        assert!(!rec.fields.contains_key(fields::AUTHOR));
        assert_eq!(rec.id, "reddit/p9");
        assert_eq!(rec.contributing_sources.len(), 2);
    }
}
