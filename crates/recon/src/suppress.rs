//! Near-duplicate suppression for free-text streams.
//!
//! Items are visited in the order given; an item survives only if its
//! normalized text scores strictly below `threshold` against every item kept
//! so far. Order therefore decides which of two near-duplicates survives:
//! callers wanting "latest wins" sort newest-first beforehand.
//!
//! Cost is O(n·k) similarity computations for n items and k survivors, which
//! is fine for one reconciliation batch.

use log::debug;

use crate::model::{fields, RawRecord};
use crate::normalize::{normalize_text, NormalizedKey, NormalizedRecord};
use crate::similarity::lcs_ratio;

/// Anything carrying a free-text body.
pub trait TextItem {
    fn text(&self) -> &str;
}

impl TextItem for str {
    fn text(&self) -> &str {
        self
    }
}

impl TextItem for String {
    fn text(&self) -> &str {
        self
    }
}

impl TextItem for RawRecord {
    fn text(&self) -> &str {
        RawRecord::text(self, fields::TEXT).unwrap_or_default()
    }
}

impl TextItem for NormalizedRecord<'_> {
    fn text(&self) -> &str {
        match &self.key {
            NormalizedKey::Text { text } => text,
            NormalizedKey::Event { .. } => "",
        }
    }
}

impl<T: TextItem + ?Sized> TextItem for &T {
    fn text(&self) -> &str {
        (**self).text()
    }
}

/// A surviving item and the items suppressed against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Collapsed<T> {
    pub kept: T,
    pub duplicates: Vec<T>,
}

/// Like [`suppress_duplicates`], but suppressed items are attached to the
/// first kept item they met the threshold with.
pub fn collapse_duplicates<T, I>(items: I, threshold: f64) -> Vec<Collapsed<T>>
where
    T: TextItem,
    I: IntoIterator<Item = T>,
{
    let mut kept: Vec<(String, Collapsed<T>)> = Vec::new();

    for item in items {
        let norm = normalize_text(item.text());
        match kept
            .iter_mut()
            .find(|(seen, _)| lcs_ratio(&norm, seen) >= threshold)
        {
            Some((seen, group)) => {
                debug!("suppressed {norm:?} as a near-duplicate of {seen:?}");
                group.duplicates.push(item);
            }
            None => kept.push((
                norm,
                Collapsed {
                    kept: item,
                    duplicates: Vec::new(),
                },
            )),
        }
    }

    kept.into_iter().map(|(_, group)| group).collect()
}

/// Keep each item whose similarity to every previously kept item is below
/// `threshold`. Order is preserved.
pub fn suppress_duplicates<T, I>(items: I, threshold: f64) -> Vec<T>
where
    T: TextItem,
    I: IntoIterator<Item = T>,
{
    collapse_duplicates(items, threshold)
        .into_iter()
        .map(|group| group.kept)
        .collect()
}
