//! Backfill driver runs against PostgreSQL.
//!
//! Run with `cargo test -- --ignored` against the database at `DATABASE_URL`.

use std::sync::Arc;

use listmap_db::test_fixtures::{snapshot, TestDatabase};
use listmap_db::{Coordinates, ListingStore, MemoryListingStore, NewSnapshot};
use listmap_jobs::{BackfillDriver, BackfillSummary};

const ROWS: [(&str, i64, Option<&str>); 7] = [
    ("https://www.gfr.cz/aukce/1", 1, Some("Kolín")),
    ("https://www.gfr.cz/aukce/1", 2, Some("Kolín")),
    ("https://www.gfr.cz/aukce/2", 2, Some("Praha 9")),
    ("https://www.gfr.cz/aukce/3", 2, Some("Brno - Královo Pole")),
    ("https://www.gfr.cz/aukce/4", 2, Some("Horní Dolní")),
    ("https://www.gfr.cz/aukce/5", 2, Some("")),
    ("https://www.gfr.cz/aukce/6", 2, None),
];

fn row(url: &str, run_id: i64, location: Option<&str>) -> NewSnapshot {
    let snapshot = snapshot("gfr", url, run_id);
    match location {
        Some(location) => snapshot.with_location(location),
        None => snapshot,
    }
}

async fn seed<S: ListingStore>(store: &S) {
    for (url, run_id, location) in ROWS {
        store.insert_snapshot(row(url, run_id, location)).await.unwrap();
    }
}

/// Summary fields that do not depend on timing.
fn tally(summary: &BackfillSummary) -> (usize, usize, usize, usize, u64, i64, i64, i64) {
    (
        summary.distinct_locations,
        summary.resolved,
        summary.unresolved,
        summary.failed,
        summary.rows_updated,
        summary.skipped_empty_location,
        summary.remaining_missing,
        summary.total_listings,
    )
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_backfill_over_postgres_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let listings = Arc::new(test_db.db.listings.clone());
    seed(listings.as_ref()).await;

    let driver = BackfillDriver::czech(listings.clone());
    let first = driver.run("gfr").await.unwrap();
    assert_eq!(tally(&first), (4, 3, 1, 0, 4, 2, 3, 7));
    assert_eq!(first.unresolved_locations, vec!["Horní Dolní".to_string()]);

    let prague = listings
        .latest("gfr", "https://www.gfr.cz/aukce/2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prague.coordinates, Some(Coordinates::new(50.0755, 14.4378)));

    let second = driver.run("gfr").await.unwrap();
    assert_eq!(second.rows_updated, 0);
    assert_eq!(tally(&second), (1, 0, 1, 0, 0, 2, 3, 7));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_postgres_and_memory_stores_tally_alike() {
    let test_db = TestDatabase::new().await;
    let pg = Arc::new(test_db.db.listings.clone());
    let memory = Arc::new(MemoryListingStore::new());
    seed(pg.as_ref()).await;
    seed(memory.as_ref()).await;

    let from_pg = BackfillDriver::czech(pg).run("gfr").await.unwrap();
    let from_memory = BackfillDriver::czech(memory).run("gfr").await.unwrap();
    assert_eq!(tally(&from_pg), tally(&from_memory));
    assert_eq!(from_pg.unresolved_locations, from_memory.unresolved_locations);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_dry_run_over_postgres_writes_nothing() {
    let test_db = TestDatabase::new().await;
    let listings = Arc::new(test_db.db.listings.clone());
    seed(listings.as_ref()).await;

    let summary = BackfillDriver::czech(listings.clone())
        .with_dry_run(true)
        .run("gfr")
        .await
        .unwrap();
    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.rows_updated, 0);
    assert_eq!(summary.remaining_missing, 7);

    test_db.cleanup().await;
}
