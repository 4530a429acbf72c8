//! Time ordering and deduplication for event streams.
//!
//! Paginated fetches overlap at page boundaries and usually arrive already sorted, so
//! sortedness is probed on a handful of sampled positions before any full check or sort.

use crate::domain::{Fill, FundingRecord, LedgerEvent, TimeMs};
use std::collections::HashSet;
use std::hash::Hash;

/// Number of evenly spaced positions probed by [`looks_sorted`].
const SAMPLE_POINTS: usize = 16;

/// Anything carrying an event timestamp.
pub trait Timed {
    fn time_ms(&self) -> TimeMs;
}

impl Timed for Fill {
    fn time_ms(&self) -> TimeMs {
        self.time_ms
    }
}

impl Timed for LedgerEvent {
    fn time_ms(&self) -> TimeMs {
        self.time_ms
    }
}

impl Timed for FundingRecord {
    fn time_ms(&self) -> TimeMs {
        self.time_ms
    }
}

/// Cheap probe: first, last and evenly spaced interior samples are non-decreasing.
///
/// A `false` answer is definitive; a `true` answer still needs [`is_time_sorted`].
pub fn looks_sorted<T: Timed>(items: &[T]) -> bool {
    if items.len() < 2 {
        return true;
    }
    let last = items.len() - 1;
    if items[0].time_ms() > items[last].time_ms() {
        return false;
    }
    let step = (last / SAMPLE_POINTS).max(1);
    let mut prev = items[0].time_ms();
    for idx in (step..last).step_by(step).chain(std::iter::once(last)) {
        let t = items[idx].time_ms();
        if t < prev {
            return false;
        }
        prev = t;
    }
    true
}

/// Full linear check.
pub fn is_time_sorted<T: Timed>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0].time_ms() <= w[1].time_ms())
}

/// Sort by time (stable) unless the input is already ordered.
///
/// The sampled check only short-circuits disorder; input that passes it still gets the
/// full linear check before the sort is skipped. Returns true if a sort was performed.
pub fn ensure_time_sorted<T: Timed>(items: &mut [T]) -> bool {
    if looks_sorted(items) && is_time_sorted(items) {
        return false;
    }
    items.sort_by_key(|item| item.time_ms());
    true
}

/// Drop later occurrences of a key, keeping original order among survivors.
///
/// Returns the survivors and the number of duplicates removed.
pub fn dedupe_stable<T, K, F>(items: Vec<T>, key: F) -> (Vec<T>, usize)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let before = items.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<T> = items.into_iter().filter(|item| seen.insert(key(item))).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Dedupe then time-sort. Idempotent.
pub fn dedupe_and_sort<T, K, F>(items: Vec<T>, key: F) -> (Vec<T>, usize)
where
    T: Timed,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let (mut kept, removed) = dedupe_stable(items, key);
    ensure_time_sorted(&mut kept);
    (kept, removed)
}
