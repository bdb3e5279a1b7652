//! In-memory listing store with the same semantics as the PostgreSQL one.
//!
//! Each listing key maps to a [`VersionChain`]; run statuses live alongside
//! so superseded runs are hidden exactly as the `latest_listings` view hides
//! them. Used by tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use listmap_core::{
    BackfillStore, CoordinateCoverage, Coordinates, Error, ListingKey, ListingSnapshot,
    ListingStore, ListingVersion, NewSnapshot, Result, RunStatus, RunStore, ScrapeRun,
    VersionChain,
};

#[derive(Default)]
struct Inner {
    chains: BTreeMap<ListingKey, VersionChain>,
    runs: BTreeMap<i64, ScrapeRun>,
}

impl Inner {
    fn is_visible(&self, run_id: i64) -> bool {
        self.runs
            .get(&run_id)
            .map_or(true, |run| run.status != RunStatus::Superseded)
    }

    fn rows_of<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a ListingSnapshot> + 'a {
        self.chains
            .iter()
            .filter(move |(key, _)| key.source == source)
            .flat_map(|(_, chain)| chain.iter())
    }
}

fn is_blank(location: &Option<String>) -> bool {
    location.as_deref().map_or(true, str::is_empty)
}

/// Listing store held in process memory.
#[derive(Default)]
pub struct MemoryListingStore {
    inner: RwLock<Inner>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.inner.read().await.chains.values().map(VersionChain::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Version history of a listing, newest first.
    pub async fn history(&self, source: &str, url: &str, limit: usize) -> Vec<ListingVersion> {
        let inner = self.inner.read().await;
        inner
            .chains
            .get(&ListingKey::new(source, url))
            .map(|chain| chain.history(limit))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<ListingSnapshot> {
        let snapshot = snapshot.into_snapshot(Uuid::now_v7(), Utc::now());
        let mut inner = self.inner.write().await;
        inner
            .chains
            .entry(snapshot.key())
            .or_default()
            .push(snapshot.clone());
        Ok(snapshot)
    }

    async fn latest(&self, source: &str, url: &str) -> Result<Option<ListingSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .chains
            .get(&ListingKey::new(source, url))
            .and_then(|chain| chain.latest(|run| inner.is_visible(run)))
            .cloned())
    }

    async fn preceding(&self, snapshot: &ListingSnapshot) -> Result<Option<ListingSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .chains
            .get(&snapshot.key())
            .and_then(|chain| chain.preceding(snapshot, |run| inner.is_visible(run)))
            .cloned())
    }

    async fn version_count(&self, source: &str, url: &str) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .chains
            .get(&ListingKey::new(source, url))
            .map_or(0, |chain| chain.len() as i64))
    }

    async fn set_coordinates_if_unset(
        &self,
        source: &str,
        url: &str,
        location_text: &str,
        coordinates: Coordinates,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some(chain) = inner.chains.get_mut(&ListingKey::new(source, url)) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in chain.iter_mut() {
            if row.coordinates.is_none() && row.location.as_deref() == Some(location_text) {
                row.coordinates = Some(coordinates);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl BackfillStore for MemoryListingStore {
    async fn distinct_unresolved_locations(&self, source: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let locations: BTreeSet<String> = inner
            .rows_of(source)
            .filter(|row| row.coordinates.is_none() && !is_blank(&row.location))
            .filter_map(|row| row.location.clone())
            .collect();
        Ok(locations.into_iter().collect())
    }

    async fn resolve_location(
        &self,
        source: &str,
        location_text: &str,
        coordinates: Coordinates,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut updated = 0;
        for (_, chain) in inner
            .chains
            .iter_mut()
            .filter(|(key, _)| key.source == source)
        {
            for row in chain.iter_mut() {
                if row.coordinates.is_none() && row.location.as_deref() == Some(location_text) {
                    row.coordinates = Some(coordinates);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn coverage(&self, source: &str) -> Result<CoordinateCoverage> {
        let inner = self.inner.read().await;
        let mut coverage = CoordinateCoverage::default();
        for row in inner.rows_of(source) {
            coverage.total += 1;
            if row.coordinates.is_some() {
                coverage.with_coordinates += 1;
            } else {
                coverage.missing_coordinates += 1;
                if is_blank(&row.location) {
                    coverage.missing_location += 1;
                }
            }
        }
        Ok(coverage)
    }
}

#[async_trait]
impl RunStore for MemoryListingStore {
    async fn record_run(&self, run_id: i64, source: &str, status: RunStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .runs
            .entry(run_id)
            .and_modify(|run| {
                run.source = source.to_string();
                run.status = status;
            })
            .or_insert_with(|| ScrapeRun {
                run_id,
                source: source.to_string(),
                status,
                started_at: Utc::now(),
                finished_at: None,
                total_listings_scraped: None,
            });
        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        total_listings_scraped: Option<i64>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| Error::NotFound(format!("scrape run {run_id}")))?;
        run.status = status;
        run.finished_at = Some(Utc::now());
        run.total_listings_scraped = total_listings_scraped;
        Ok(())
    }

    async fn mark_superseded(&self, run_id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| Error::NotFound(format!("scrape run {run_id}")))?;
        run.status = RunStatus::Superseded;
        Ok(())
    }

    async fn list_runs(&self, source: &str, limit: i64) -> Result<Vec<ScrapeRun>> {
        let inner = self.inner.read().await;
        let mut runs: Vec<ScrapeRun> = inner
            .runs
            .values()
            .filter(|run| run.source == source)
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        runs.truncate(limit.max(1) as usize);
        Ok(runs)
    }
}
