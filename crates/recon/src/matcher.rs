use chrono::Duration;
use log::debug;

use crate::model::RawRecord;
use crate::normalize::{normalize_record, NormalizedKey, NormalizedRecord};
use crate::similarity::lcs_ratio;

/// A candidate pairing, as indices into the left and right inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPair {
    pub left: usize,
    pub right: usize,
    /// Mean of the home and away name similarities.
    pub score: f64,
    /// Absolute start-time delta; `None` when matched on league key alone.
    pub delta: Option<Duration>,
}

/// Equal, or one is a substring of the other ("yankees" in "ny yankees").
/// Both sides are compared with spaces removed, so spacing variants such as
/// "st louis" and "stlouis" agree.
pub fn names_agree(a: &str, b: &str) -> bool {
    let a = compact(a);
    let b = compact(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn compact(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Match raw records. Records that fail normalization, and free-text items,
/// never pair. Indices refer to the given slices.
pub fn find_matches(left: &[RawRecord], right: &[RawRecord], window: Duration) -> Vec<MatchPair> {
    let left_norm = normalize_indexed(left);
    let right_norm = normalize_indexed(right);

    let left_refs: Vec<&NormalizedRecord<'_>> = left_norm.iter().map(|(_, n)| n).collect();
    let right_refs: Vec<&NormalizedRecord<'_>> = right_norm.iter().map(|(_, n)| n).collect();

    match_normalized(&left_refs, &right_refs, window)
        .into_iter()
        .map(|p| MatchPair {
            left: left_norm[p.left].0,
            right: right_norm[p.right].0,
            ..p
        })
        .collect()
}

fn normalize_indexed(records: &[RawRecord]) -> Vec<(usize, NormalizedRecord<'_>)> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| normalize_record(r).ok().map(|n| (i, n)))
        .collect()
}

/// Greedy first-fit matching in left order. A right record is used at most
/// once. Among a left record's candidates the smallest delta wins, league-only
/// candidates rank after timed ones, and remaining ties go to the earlier
/// right record.
pub fn match_normalized(
    left: &[&NormalizedRecord<'_>],
    right: &[&NormalizedRecord<'_>],
    window: Duration,
) -> Vec<MatchPair> {
    let mut right_used = vec![false; right.len()];
    let mut matched = Vec::new();

    for (li, l) in left.iter().enumerate() {
        let mut best: Option<(usize, Option<Duration>)> = None;

        for (ri, r) in right.iter().enumerate() {
            if right_used[ri] {
                continue;
            }
            let Some(delta) = candidate_delta(l, r, window) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, best_delta)) => rank(delta) < rank(best_delta),
            };
            if better {
                best = Some((ri, delta));
            }
        }

        if let Some((ri, delta)) = best {
            right_used[ri] = true;
            debug!(
                "matched {} <-> {} (delta {:?})",
                l.raw.key(),
                right[ri].raw.key(),
                delta.map(|d| d.num_seconds())
            );
            matched.push(MatchPair {
                left: li,
                right: ri,
                score: name_score(l, right[ri]),
                delta,
            });
        }
    }

    matched
}

/// Timed candidates sort before league-only ones, then by delta.
fn rank(delta: Option<Duration>) -> (bool, Duration) {
    (delta.is_none(), delta.unwrap_or_else(Duration::zero))
}

/// `None` when the pair is not a candidate; `Some(None)` for a league-key match.
fn candidate_delta(
    l: &NormalizedRecord<'_>,
    r: &NormalizedRecord<'_>,
    window: Duration,
) -> Option<Option<Duration>> {
    let (
        NormalizedKey::Event { home: lh, away: la, start_minute: lm },
        NormalizedKey::Event { home: rh, away: ra, start_minute: rm },
    ) = (&l.key, &r.key)
    else {
        return None;
    };

    if !names_agree(lh, rh) || !names_agree(la, ra) {
        return None;
    }

    if let (Some(lc), Some(rc)) = (&l.category, &r.category) {
        if lc != rc {
            return None;
        }
    }

    // Starts compare at minute resolution; seconds never split a pair.
    match (*lm, *rm) {
        (Some(ls), Some(rs)) => {
            let delta = (ls - rs).abs();
            (delta <= window).then_some(Some(delta))
        }
        // Without a time on both sides only an explicit league agreement counts
        _ => (l.category.is_some() && r.category.is_some()).then_some(None),
    }
}

fn name_score(l: &NormalizedRecord<'_>, r: &NormalizedRecord<'_>) -> f64 {
    match (&l.key, &r.key) {
        (
            NormalizedKey::Event { home: lh, away: la, .. },
            NormalizedKey::Event { home: rh, away: ra, .. },
        ) => (lcs_ratio(lh, rh) + lcs_ratio(la, ra)) / 2.0,
        _ => 0.0,
    }
}
