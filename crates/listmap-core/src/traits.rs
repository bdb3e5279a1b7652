//! Store traits implemented by the PostgreSQL and in-memory backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// LISTING VERSION STORE
// =============================================================================

/// Append-only store of listing snapshots keyed by `(source, url)`.
///
/// Lookups for an unknown key return `None` or zero rather than an error.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Append a snapshot. Existing snapshots are never modified.
    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<ListingSnapshot>;

    /// Snapshot with the highest run id among non-superseded runs.
    async fn latest(&self, source: &str, url: &str) -> Result<Option<ListingSnapshot>>;

    /// Snapshot from the next-lower non-superseded run of the same listing.
    async fn preceding(&self, snapshot: &ListingSnapshot) -> Result<Option<ListingSnapshot>>;

    /// Change flags of `snapshot` against its predecessor.
    async fn change_flags(&self, snapshot: &ListingSnapshot) -> Result<ChangeFlags> {
        let previous = self.preceding(snapshot).await?;
        Ok(ChangeFlags::between(previous.as_ref(), snapshot))
    }

    /// Number of snapshots stored for the listing.
    async fn version_count(&self, source: &str, url: &str) -> Result<i64>;

    /// Set coordinates on the listing's rows that still have the given
    /// location text and no coordinates. Returns the number of rows updated.
    async fn set_coordinates_if_unset(
        &self,
        source: &str,
        url: &str,
        location_text: &str,
        coordinates: Coordinates,
    ) -> Result<u64>;
}

// =============================================================================
// BACKFILL
// =============================================================================

/// Source-wide operations used by the coordinate backfill.
#[async_trait]
pub trait BackfillStore: Send + Sync {
    /// Distinct non-empty location strings of rows without coordinates, sorted.
    async fn distinct_unresolved_locations(&self, source: &str) -> Result<Vec<String>>;

    /// Set coordinates on every row of `source` with exactly this location
    /// text and no coordinates. Returns the number of rows updated.
    async fn resolve_location(
        &self,
        source: &str,
        location_text: &str,
        coordinates: Coordinates,
    ) -> Result<u64>;

    /// Coordinate coverage of all rows of `source`.
    async fn coverage(&self, source: &str) -> Result<CoordinateCoverage>;
}

// =============================================================================
// SCRAPE RUNS
// =============================================================================

/// Bookkeeping for scrape runs; a superseded run hides its snapshots from
/// latest/preceding lookups.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert or update a run (upsert on `run_id`).
    async fn record_run(&self, run_id: i64, source: &str, status: RunStatus) -> Result<()>;

    /// Close a run with its final status and listing count.
    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        total_listings_scraped: Option<i64>,
    ) -> Result<()>;

    /// Mark a run as superseded.
    async fn mark_superseded(&self, run_id: i64) -> Result<()>;

    /// Runs of a source, newest first.
    async fn list_runs(&self, source: &str, limit: i64) -> Result<Vec<ScrapeRun>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    /// Two fixed snapshots; only `preceding` is meaningful.
    struct PairStore {
        previous: ListingSnapshot,
    }

    #[async_trait]
    impl ListingStore for PairStore {
        async fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<ListingSnapshot> {
            Ok(snapshot.into_snapshot(Uuid::nil(), Utc::now()))
        }

        async fn latest(&self, _source: &str, _url: &str) -> Result<Option<ListingSnapshot>> {
            Ok(None)
        }

        async fn preceding(&self, snapshot: &ListingSnapshot) -> Result<Option<ListingSnapshot>> {
            Ok((snapshot.run_id > self.previous.run_id).then(|| self.previous.clone()))
        }

        async fn version_count(&self, _source: &str, _url: &str) -> Result<i64> {
            Ok(2)
        }

        async fn set_coordinates_if_unset(
            &self,
            _source: &str,
            _url: &str,
            _location_text: &str,
            _coordinates: Coordinates,
        ) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_default_change_flags_uses_preceding() {
        let previous = NewSnapshot::new("gfr", "https://example.cz/1", 1)
            .with_title("Lis na olej")
            .into_snapshot(Uuid::nil(), Utc::now());
        let store = PairStore { previous };

        let current = NewSnapshot::new("gfr", "https://example.cz/1", 2)
            .with_title("Lis na olej, nový")
            .into_snapshot(Uuid::nil(), Utc::now());
        let flags = store.change_flags(&current).await.unwrap();
        assert!(flags.title_changed);

        let first = NewSnapshot::new("gfr", "https://example.cz/1", 1)
            .with_title("Jiný")
            .into_snapshot(Uuid::nil(), Utc::now());
        assert_eq!(store.change_flags(&first).await.unwrap(), ChangeFlags::default());
    }
}
