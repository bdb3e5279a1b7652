//! Change detection between consecutive scrapes of the same listing.
//!
//! A listing's snapshots form a chain ordered by run id. The map view shows
//! the newest snapshot and flags fields that differ from the snapshot right
//! before it. Stores that keep snapshots in memory use [`VersionChain`];
//! the PostgreSQL store expresses the same rules in SQL.

use crate::models::{ChangeFlags, ListingSnapshot, ListingVersion};

/// True when both sides are present and differ.
///
/// A missing previous value never counts as a change, and neither does a
/// value that disappeared in the current scrape.
fn differs<T: PartialEq>(previous: &Option<T>, current: &Option<T>) -> bool {
    matches!((previous, current), (Some(p), Some(c)) if p != c)
}

impl ChangeFlags {
    /// Compare a snapshot with its immediate predecessor, if any.
    pub fn between(previous: Option<&ListingSnapshot>, current: &ListingSnapshot) -> Self {
        let Some(previous) = previous else {
            return Self::default();
        };
        Self {
            price_changed: differs(&previous.price, &current.price),
            description_changed: differs(&previous.description, &current.description),
            title_changed: differs(&previous.title, &current.title),
            top_status_changed: differs(&previous.is_top, &current.is_top),
            views_changed: false,
        }
    }
}

/// All snapshots of one listing, ordered by run id (oldest first).
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    snapshots: Vec<ListingSnapshot>,
}

impl VersionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping run order; a snapshot sharing a run id lands after the
    /// existing ones so the most recent write wins ties.
    pub fn push(&mut self, snapshot: ListingSnapshot) {
        let at = self
            .snapshots
            .partition_point(|s| s.run_id <= snapshot.run_id);
        self.snapshots.insert(at, snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ListingSnapshot> {
        self.snapshots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ListingSnapshot> {
        self.snapshots.iter_mut()
    }

    /// Newest snapshot whose run passes `visible`.
    pub fn latest<F>(&self, visible: F) -> Option<&ListingSnapshot>
    where
        F: Fn(i64) -> bool,
    {
        self.snapshots.iter().rev().find(|s| visible(s.run_id))
    }

    /// Newest visible snapshot from a strictly earlier run than `snapshot`.
    pub fn preceding<F>(&self, snapshot: &ListingSnapshot, visible: F) -> Option<&ListingSnapshot>
    where
        F: Fn(i64) -> bool,
    {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.run_id < snapshot.run_id && visible(s.run_id))
    }

    /// Up to `limit` versions, newest first, numbered from 1.
    pub fn history(&self, limit: usize) -> Vec<ListingVersion> {
        self.snapshots
            .iter()
            .rev()
            .take(limit)
            .enumerate()
            .map(|(i, snapshot)| ListingVersion {
                version_number: i as i64 + 1,
                snapshot: snapshot.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSnapshot;
    use chrono::Utc;
    use uuid::Uuid;

    fn snap(run_id: i64) -> NewSnapshot {
        NewSnapshot::new("bazos", "https://example.cz/inzerat/1", run_id)
            .with_title("Traktor Zetor")
            .with_price(150_000)
            .with_description("Zachovalý stav")
            .with_top(false)
            .with_views(10)
    }

    fn build(new: NewSnapshot) -> ListingSnapshot {
        new.into_snapshot(Uuid::now_v7(), Utc::now())
    }

    #[test]
    fn test_first_snapshot_has_no_changes() {
        let current = build(snap(1));
        assert_eq!(ChangeFlags::between(None, &current), ChangeFlags::default());
    }

    #[test]
    fn test_price_only_change() {
        let previous = build(snap(1));
        let current = build(snap(2).with_price(140_000).with_views(99));
        let flags = ChangeFlags::between(Some(&previous), &current);
        assert_eq!(
            flags,
            ChangeFlags {
                price_changed: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_views_never_flagged() {
        let previous = build(snap(1).with_views(1));
        let current = build(snap(2).with_views(5000));
        assert!(!ChangeFlags::between(Some(&previous), &current).views_changed);
    }

    #[test]
    fn test_each_tracked_field() {
        let previous = build(snap(1));
        let current = build(
            snap(2)
                .with_title("Traktor Zetor 7211")
                .with_description("Po servisu")
                .with_top(true),
        );
        let flags = ChangeFlags::between(Some(&previous), &current);
        assert!(!flags.price_changed);
        assert!(flags.title_changed);
        assert!(flags.description_changed);
        assert!(flags.top_status_changed);
    }

    #[test]
    fn test_null_values_never_count_as_change() {
        let mut previous = build(snap(1));
        previous.price = None;
        let mut current = build(snap(2));
        current.description = None;
        let flags = ChangeFlags::between(Some(&previous), &current);
        assert!(!flags.price_changed);
        assert!(!flags.description_changed);
    }

    #[test]
    fn test_chain_orders_by_run_id() {
        let mut chain = VersionChain::new();
        chain.push(build(snap(5)));
        chain.push(build(snap(2)));
        chain.push(build(snap(9)));
        let runs: Vec<i64> = chain.iter().map(|s| s.run_id).collect();
        assert_eq!(runs, vec![2, 5, 9]);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_latest_and_preceding_respect_visibility() {
        let mut chain = VersionChain::new();
        for run in [1, 2, 3] {
            chain.push(build(snap(run)));
        }
        let all = |_: i64| true;
        let hide_three = |run: i64| run != 3;
        let hide_two = |run: i64| run != 2;

        assert_eq!(chain.latest(all).map(|s| s.run_id), Some(3));
        assert_eq!(chain.latest(hide_three).map(|s| s.run_id), Some(2));

        let latest = chain.latest(all).unwrap().clone();
        assert_eq!(chain.preceding(&latest, all).map(|s| s.run_id), Some(2));
        assert_eq!(chain.preceding(&latest, hide_two).map(|s| s.run_id), Some(1));

        let first = chain.iter().next().unwrap().clone();
        assert!(chain.preceding(&first, all).is_none());
    }

    #[test]
    fn test_history_is_numbered_newest_first() {
        let mut chain = VersionChain::new();
        for run in 1..=4 {
            chain.push(build(snap(run)));
        }
        let history = chain.history(3);
        let pairs: Vec<(i64, i64)> = history
            .iter()
            .map(|v| (v.version_number, v.snapshot.run_id))
            .collect();
        assert_eq!(pairs, vec![(1, 4), (2, 3), (3, 2)]);
    }
}
