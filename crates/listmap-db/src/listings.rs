//! PostgreSQL listing version store.
//!
//! Every scrape appends rows to `listings`; nothing is rewritten except the
//! one-time coordinate backfill. The `latest_listings` view picks the newest
//! non-superseded snapshot per `(source, url)`, and change flags compare it
//! with the snapshot from the next-lower run via a lateral join.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, QueryBuilder, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use listmap_core::defaults::{HISTORY_LIMIT, LISTING_PAGE_LIMIT};
use listmap_core::{
    BackfillStore, CategoryCount, ChangeFlags, CoordinateCoverage, Coordinates, Error,
    ListingFilter, ListingSnapshot, ListingStats, ListingStore, ListingVersion,
    ListingWithChanges, NewSnapshot, Result, SourceCount,
};

use crate::escape_like;

/// Snapshot columns, unqualified.
const SNAPSHOT_COLUMNS: &str = "id, source, url, run_id, title, category, price, price_text, \
     description, full_description, location, views, posted_on, is_top, image_url, images, \
     contact_name, phone, lat, lng, scraped_at";

/// Excludes rows of superseded runs; expects the listing alias `p`.
const NOT_SUPERSEDED: &str = "NOT EXISTS (SELECT 1 FROM scrape_runs r \
     WHERE r.run_id = p.run_id AND r.status = 'superseded')";

/// Distinct location texts still lacking coordinates, in byte order.
///
/// DISTINCT runs in the subquery; Postgres rejects an ORDER BY expression
/// (here the collated column) that is not in a DISTINCT select list.
const UNRESOLVED_LOCATIONS_SQL: &str = r#"
    SELECT d.location
    FROM (
        SELECT DISTINCT location
        FROM listings
        WHERE source = $1
          AND lat IS NULL
          AND location IS NOT NULL
          AND location <> ''
    ) d
    ORDER BY d.location COLLATE "C"
"#;

/// PostgreSQL implementation of the listing version store.
#[derive(Clone)]
pub struct PgListingRepository {
    pool: Pool<Postgres>,
}

impl PgListingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_snapshot_row(row: &PgRow) -> ListingSnapshot {
        ListingSnapshot {
            id: row.get("id"),
            source: row.get("source"),
            url: row.get("url"),
            run_id: row.get("run_id"),
            title: row.get("title"),
            category: row.get("category"),
            price: row.get("price"),
            price_text: row.get("price_text"),
            description: row.get("description"),
            full_description: row.get("full_description"),
            location: row.get("location"),
            views: row.get("views"),
            posted_on: row.get("posted_on"),
            is_top: row.get("is_top"),
            image_url: row.get("image_url"),
            images: row.get("images"),
            contact_name: row.get("contact_name"),
            phone: row.get("phone"),
            coordinates: Coordinates::from_columns(row.get("lat"), row.get("lng")),
            scraped_at: row.get("scraped_at"),
        }
    }

    fn parse_with_changes_row(row: &PgRow) -> ListingWithChanges {
        ListingWithChanges {
            snapshot: Self::parse_snapshot_row(row),
            changes: ChangeFlags {
                price_changed: row.get("price_changed"),
                description_changed: row.get("description_changed"),
                title_changed: row.get("title_changed"),
                top_status_changed: row.get("top_status_changed"),
                views_changed: false,
            },
            total_versions: row.get("total_versions"),
        }
    }

    /// Latest snapshots joined to their predecessor.
    ///
    /// With `id` set, only that listing is selected and the coordinate
    /// requirement of the map view is dropped.
    fn latest_with_changes_query<'a>(
        filter: &'a ListingFilter,
        id: Option<Uuid>,
    ) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "WITH latest AS (SELECT * FROM latest_listings l WHERE TRUE",
        );

        if let Some(id) = id {
            qb.push(" AND l.id = ").push_bind(id);
        } else {
            qb.push(" AND l.lat IS NOT NULL AND l.lng IS NOT NULL");
        }
        if let Some(category) = &filter.category {
            qb.push(" AND l.category = ").push_bind(category);
        }
        if let Some(price_min) = filter.price_min {
            qb.push(" AND l.price >= ").push_bind(price_min);
        }
        if let Some(price_max) = filter.price_max {
            qb.push(" AND l.price <= ").push_bind(price_max);
        }
        if let Some(location) = filter.location.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND l.location ILIKE ")
                .push_bind(format!("%{}%", escape_like(location)));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (l.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR l.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(source) = &filter.source {
            qb.push(" AND l.source = ").push_bind(source);
        }

        qb.push(
            ") \
             SELECT l.*, \
                 COALESCE(prev.price <> l.price, false) AS price_changed, \
                 COALESCE(prev.description <> l.description, false) AS description_changed, \
                 COALESCE(prev.title <> l.title, false) AS title_changed, \
                 COALESCE(prev.is_top <> l.is_top, false) AS top_status_changed, \
                 (SELECT COUNT(*) FROM listings v \
                  WHERE v.source = l.source AND v.url = l.url) AS total_versions \
             FROM latest l \
             LEFT JOIN LATERAL ( \
                 SELECT p.price, p.description, p.title, p.is_top \
                 FROM listings p \
                 WHERE p.source = l.source AND p.url = l.url AND p.run_id < l.run_id AND ",
        );
        qb.push(NOT_SUPERSEDED);
        qb.push(
            " ORDER BY p.run_id DESC, p.scraped_at DESC LIMIT 1 \
             ) prev ON TRUE \
             ORDER BY l.scraped_at DESC LIMIT ",
        );
        let limit = filter
            .limit
            .unwrap_or(LISTING_PAGE_LIMIT)
            .clamp(1, LISTING_PAGE_LIMIT);
        qb.push_bind(limit);
        qb
    }

    /// Latest geocoded listings matching the filter, newest scrape first.
    #[instrument(skip(self), fields(subsystem = "database", component = "listings", op = "list_latest"))]
    pub async fn list_latest(&self, filter: &ListingFilter) -> Result<Vec<ListingWithChanges>> {
        if let (Some(min), Some(max)) = (filter.price_min, filter.price_max) {
            if min > max {
                return Err(Error::InvalidInput(format!(
                    "price_min ({min}) is greater than price_max ({max})"
                )));
            }
        }

        let start = Instant::now();
        let rows = Self::latest_with_changes_query(filter, None)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed latest listings"
        );
        Ok(rows.iter().map(Self::parse_with_changes_row).collect())
    }

    /// A latest listing by snapshot id, with change flags.
    pub async fn get_latest_by_id(&self, id: Uuid) -> Result<Option<ListingWithChanges>> {
        let filter = ListingFilter::default();
        let row = Self::latest_with_changes_query(&filter, Some(id))
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_with_changes_row))
    }

    /// Version history of a listing, newest first, numbered from 1.
    pub async fn history(
        &self,
        source: &str,
        url: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ListingVersion>> {
        let query = format!(
            "SELECT {SNAPSHOT_COLUMNS}, \
                 ROW_NUMBER() OVER (ORDER BY run_id DESC, scraped_at DESC) AS version_number \
             FROM listings \
             WHERE source = $1 AND url = $2 \
             ORDER BY run_id DESC, scraped_at DESC \
             LIMIT $3"
        );
        let rows = sqlx::query(&query)
            .bind(source)
            .bind(url)
            .bind(limit.unwrap_or(HISTORY_LIMIT).max(1))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| ListingVersion {
                version_number: row.get("version_number"),
                snapshot: Self::parse_snapshot_row(row),
            })
            .collect())
    }

    /// Aggregate statistics over latest geocoded listings.
    pub async fn stats(&self, source: Option<&str>) -> Result<ListingStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_listings,
                COUNT(DISTINCT category) AS total_categories,
                AVG(price)::float8 AS avg_price,
                MIN(price) AS min_price,
                MAX(price) AS max_price,
                COUNT(*) FILTER (WHERE is_top) AS top_listings
            FROM latest_listings
            WHERE lat IS NOT NULL AND lng IS NOT NULL
              AND ($1::text IS NULL OR source = $1)
            "#,
        )
        .bind(source)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ListingStats {
            total_listings: row.get("total_listings"),
            total_categories: row.get("total_categories"),
            avg_price: row.get("avg_price"),
            min_price: row.get("min_price"),
            max_price: row.get("max_price"),
            top_listings: row.get("top_listings"),
        })
    }

    /// Category counts over latest geocoded listings, most common first.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT category, COUNT(*) AS count
            FROM latest_listings
            WHERE lat IS NOT NULL AND lng IS NOT NULL
            GROUP BY category
            ORDER BY count DESC, category
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    /// Sources with geocoded latest listings, most listings first.
    pub async fn sources(&self) -> Result<Vec<SourceCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT source, COUNT(*) AS count
            FROM latest_listings
            WHERE lat IS NOT NULL AND lng IS NOT NULL
            GROUP BY source
            ORDER BY count DESC, source
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|(source, count)| SourceCount { source, count })
            .collect())
    }
}

#[async_trait]
impl ListingStore for PgListingRepository {
    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<ListingSnapshot> {
        let snapshot = snapshot.into_snapshot(Uuid::now_v7(), Utc::now());
        let (lat, lng) = match snapshot.coordinates {
            Some(c) => (Some(c.lat), Some(c.lng)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO listings (
                id, source, url, run_id, title, category, price, price_text,
                description, full_description, location, views, posted_on, is_top,
                image_url, images, contact_name, phone, lat, lng, scraped_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(snapshot.id)
        .bind(&snapshot.source)
        .bind(&snapshot.url)
        .bind(snapshot.run_id)
        .bind(&snapshot.title)
        .bind(&snapshot.category)
        .bind(snapshot.price)
        .bind(&snapshot.price_text)
        .bind(&snapshot.description)
        .bind(&snapshot.full_description)
        .bind(&snapshot.location)
        .bind(snapshot.views)
        .bind(&snapshot.posted_on)
        .bind(snapshot.is_top)
        .bind(&snapshot.image_url)
        .bind(&snapshot.images)
        .bind(&snapshot.contact_name)
        .bind(&snapshot.phone)
        .bind(lat)
        .bind(lng)
        .bind(snapshot.scraped_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(snapshot)
    }

    async fn latest(&self, source: &str, url: &str) -> Result<Option<ListingSnapshot>> {
        let query =
            format!("SELECT {SNAPSHOT_COLUMNS} FROM latest_listings WHERE source = $1 AND url = $2");
        let row = sqlx::query(&query)
            .bind(source)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_snapshot_row))
    }

    async fn preceding(&self, snapshot: &ListingSnapshot) -> Result<Option<ListingSnapshot>> {
        let query = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM listings p \
             WHERE p.source = $1 AND p.url = $2 AND p.run_id < $3 AND {NOT_SUPERSEDED} \
             ORDER BY p.run_id DESC, p.scraped_at DESC \
             LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(&snapshot.source)
            .bind(&snapshot.url)
            .bind(snapshot.run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_snapshot_row))
    }

    async fn version_count(&self, source: &str, url: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE source = $1 AND url = $2")
            .bind(source)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn set_coordinates_if_unset(
        &self,
        source: &str,
        url: &str,
        location_text: &str,
        coordinates: Coordinates,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET lat = $1, lng = $2
            WHERE source = $3
              AND url = $4
              AND location = $5
              AND lat IS NULL
            "#,
        )
        .bind(coordinates.lat)
        .bind(coordinates.lng)
        .bind(source)
        .bind(url)
        .bind(location_text)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BackfillStore for PgListingRepository {
    async fn distinct_unresolved_locations(&self, source: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(UNRESOLVED_LOCATIONS_SQL)
        .bind(source)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn resolve_location(
        &self,
        source: &str,
        location_text: &str,
        coordinates: Coordinates,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET lat = $1, lng = $2
            WHERE source = $3
              AND location = $4
              AND lat IS NULL
            "#,
        )
        .bind(coordinates.lat)
        .bind(coordinates.lng)
        .bind(source)
        .bind(location_text)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn coverage(&self, source: &str) -> Result<CoordinateCoverage> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE lat IS NOT NULL) AS with_coordinates,
                COUNT(*) FILTER (WHERE lat IS NULL) AS missing_coordinates,
                COUNT(*) FILTER (
                    WHERE lat IS NULL AND (location IS NULL OR location = '')
                ) AS missing_location
            FROM listings
            WHERE source = $1
            "#,
        )
        .bind(source)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(CoordinateCoverage {
            total: row.get("total"),
            with_coordinates: row.get("with_coordinates"),
            missing_coordinates: row.get("missing_coordinates"),
            missing_location: row.get("missing_location"),
        })
    }
}
