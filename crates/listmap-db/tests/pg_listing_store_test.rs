//! PostgreSQL listing store tests.
//!
//! Each test runs in its own schema. Run with `cargo test -- --ignored`
//! against the database at `DATABASE_URL`.

use listmap_db::test_fixtures::{snapshot, TestDatabase};
use listmap_db::{
    BackfillStore, ChangeFlags, Coordinates, Error, ListingFilter, ListingStore, RunStatus,
    RunStore,
};

const URL: &str = "https://www.gfr.cz/aukce/lis-na-olej";
const KOLIN: Coordinates = Coordinates {
    lat: 50.0283,
    lng: 15.1998,
};

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_latest_and_change_flags() {
    let test_db = TestDatabase::new().await;
    let listings = &test_db.db.listings;

    listings.insert_snapshot(snapshot("gfr", URL, 1)).await.unwrap();
    listings
        .insert_snapshot(snapshot("gfr", URL, 2).with_price(9_500).with_views(55))
        .await
        .unwrap();

    let latest = listings.latest("gfr", URL).await.unwrap().unwrap();
    assert_eq!(latest.run_id, 2);

    let flags = listings.change_flags(&latest).await.unwrap();
    assert!(flags.price_changed);
    assert!(!flags.title_changed);
    assert!(!flags.description_changed);
    assert!(!flags.top_status_changed);
    assert!(!flags.views_changed);
    assert_eq!(listings.version_count("gfr", URL).await.unwrap(), 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_null_to_value_is_not_a_change() {
    let test_db = TestDatabase::new().await;
    let listings = &test_db.db.listings;

    listings
        .insert_snapshot(listmap_db::NewSnapshot::new("gfr", URL, 1).with_title("Lis"))
        .await
        .unwrap();
    let current = listings
        .insert_snapshot(snapshot("gfr", URL, 2).with_title("Lis"))
        .await
        .unwrap();

    assert_eq!(
        listings.change_flags(&current).await.unwrap(),
        ChangeFlags::default()
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_superseded_run_is_skipped() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    db.listings.insert_snapshot(snapshot("gfr", URL, 1)).await.unwrap();
    db.listings
        .insert_snapshot(snapshot("gfr", URL, 2).with_price(1))
        .await
        .unwrap();
    db.runs.record_run(2, "gfr", RunStatus::Succeeded).await.unwrap();
    db.runs.mark_superseded(2).await.unwrap();

    let latest = db.listings.latest("gfr", URL).await.unwrap().unwrap();
    assert_eq!(latest.run_id, 1);
    assert!(db.listings.preceding(&latest).await.unwrap().is_none());

    let listed = db
        .listings
        .get_latest_by_id(latest.id)
        .await
        .unwrap();
    // Ungeocoded listings are still reachable by id.
    assert_eq!(listed.map(|l| l.snapshot.run_id), Some(1));

    let err = db.runs.mark_superseded(99).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_set_coordinates_if_unset_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let listings = &test_db.db.listings;

    listings
        .insert_snapshot(snapshot("gfr", URL, 1).with_location("Kolín"))
        .await
        .unwrap();

    let first = listings
        .set_coordinates_if_unset("gfr", URL, "Kolín", KOLIN)
        .await
        .unwrap();
    assert_eq!(first, 1);

    let second = listings
        .set_coordinates_if_unset("gfr", URL, "Kolín", Coordinates::new(1.0, 1.0))
        .await
        .unwrap();
    assert_eq!(second, 0);

    let latest = listings.latest("gfr", URL).await.unwrap().unwrap();
    assert_eq!(latest.coordinates, Some(KOLIN));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_backfill_queries() {
    let test_db = TestDatabase::new().await;
    let listings = &test_db.db.listings;

    for (i, location) in ["Kolín", "Brno", "Kolín", ""].iter().enumerate() {
        let url = format!("https://www.gfr.cz/aukce/{i}");
        listings
            .insert_snapshot(snapshot("gfr", &url, 1).with_location(*location))
            .await
            .unwrap();
    }
    listings
        .insert_snapshot(snapshot("gfr", "https://www.gfr.cz/aukce/none", 1))
        .await
        .unwrap();

    let locations = listings.distinct_unresolved_locations("gfr").await.unwrap();
    assert_eq!(locations, vec!["Brno".to_string(), "Kolín".to_string()]);

    let updated = listings.resolve_location("gfr", "Kolín", KOLIN).await.unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        listings.resolve_location("gfr", "Kolín", KOLIN).await.unwrap(),
        0
    );

    let coverage = listings.coverage("gfr").await.unwrap();
    assert_eq!(coverage.total, 5);
    assert_eq!(coverage.with_coordinates, 2);
    assert_eq!(coverage.missing_coordinates, 3);
    assert_eq!(coverage.missing_location, 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_list_latest_filters_and_history() {
    let test_db = TestDatabase::new().await;
    let listings = &test_db.db.listings;

    listings
        .insert_snapshot(snapshot("gfr", URL, 1).with_coordinates(KOLIN))
        .await
        .unwrap();
    listings
        .insert_snapshot(
            snapshot("gfr", URL, 2)
                .with_price(8_000)
                .with_location("Kolín")
                .with_coordinates(KOLIN),
        )
        .await
        .unwrap();
    listings
        .insert_snapshot(
            snapshot("gfr", "https://www.gfr.cz/aukce/traktor", 2)
                .with_title("Traktor Zetor")
                .with_price(150_000)
                .with_coordinates(Coordinates::new(49.1951, 16.6068)),
        )
        .await
        .unwrap();

    let cheap = listings
        .list_latest(&ListingFilter {
            price_max: Some(10_000),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cheap.len(), 1);
    assert!(cheap[0].changes.price_changed);
    assert_eq!(cheap[0].total_versions, 2);

    let search = listings
        .list_latest(&ListingFilter {
            search: Some("zetor".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(search.len(), 1);
    assert_eq!(search[0].snapshot.title.as_deref(), Some("Traktor Zetor"));

    let bad = listings
        .list_latest(&ListingFilter {
            price_min: Some(10),
            price_max: Some(1),
            ..Default::default()
        })
        .await;
    assert!(matches!(bad, Err(Error::InvalidInput(_))));

    let history = listings.history("gfr", URL, None).await.unwrap();
    let versions: Vec<(i64, i64)> = history
        .iter()
        .map(|v| (v.version_number, v.snapshot.run_id))
        .collect();
    assert_eq!(versions, vec![(1, 2), (2, 1)]);

    let stats = listings.stats(Some("gfr")).await.unwrap();
    assert_eq!(stats.total_listings, 2);
    assert_eq!(stats.min_price, Some(8_000));

    let sources = listings.sources().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].count, 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_run_bookkeeping() {
    let test_db = TestDatabase::new().await;
    let runs = &test_db.db.runs;

    runs.record_run(7, "gfr", RunStatus::Running).await.unwrap();
    runs.finish_run(7, RunStatus::Succeeded, Some(321)).await.unwrap();

    let run = runs.get_run(7).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.total_listings_scraped, Some(321));
    assert!(run.finished_at.is_some());

    let err = runs.finish_run(8, RunStatus::Failed, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(runs.list_runs("gfr", 10).await.unwrap().len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_half_set_coordinates_are_rejected() {
    let test_db = TestDatabase::new().await;

    let result = sqlx::query(
        "INSERT INTO listings (id, source, url, run_id, location, lat) \
         VALUES (gen_random_uuid(), 'gfr', $1, 1, 'Kolín', 50.0283)",
    )
    .bind(URL)
    .execute(&test_db.pool)
    .await;
    let err = result.unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.code().as_deref(), Some("23514"));

    // A fully unresolved row is still picked up by the backfill queries.
    test_db
        .db
        .listings
        .insert_snapshot(snapshot("gfr", URL, 1).with_location("Kolín"))
        .await
        .unwrap();
    assert_eq!(
        test_db.db.listings.distinct_unresolved_locations("gfr").await.unwrap(),
        vec!["Kolín".to_string()]
    );

    test_db.cleanup().await;
}
