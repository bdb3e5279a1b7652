//! Scrape run bookkeeping.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{info, warn};

use listmap_core::{Error, Result, RunStatus, RunStore, ScrapeRun};

/// PostgreSQL implementation of RunStore.
#[derive(Clone)]
pub struct PgRunRepository {
    pool: Pool<Postgres>,
}

impl PgRunRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_run_row(row: &PgRow) -> Result<ScrapeRun> {
        let status: String = row.get("status");
        Ok(ScrapeRun {
            run_id: row.get("run_id"),
            source: row.get("source"),
            status: status.parse()?,
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
            total_listings_scraped: row.get("total_listings_scraped"),
        })
    }

    /// A single run by id.
    pub async fn get_run(&self, run_id: i64) -> Result<Option<ScrapeRun>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, source, status, started_at, finished_at, total_listings_scraped
            FROM scrape_runs
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_run_row).transpose()
    }
}

#[async_trait]
impl RunStore for PgRunRepository {
    async fn record_run(&self, run_id: i64, source: &str, status: RunStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_runs (run_id, source, status, started_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (run_id) DO UPDATE
                SET source = EXCLUDED.source, status = EXCLUDED.status
            "#,
        )
        .bind(run_id)
        .bind(source)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "runs",
            op = "record_run",
            run_id,
            source,
            status = status.as_str(),
            "Recorded scrape run"
        );
        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        total_listings_scraped: Option<i64>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_runs
            SET status = $2, finished_at = now(), total_listings_scraped = $3
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(total_listings_scraped)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("scrape run {run_id}")));
        }
        Ok(())
    }

    async fn mark_superseded(&self, run_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE scrape_runs SET status = 'superseded' WHERE run_id = $1")
            .bind(run_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            warn!(
                subsystem = "database",
                component = "runs",
                run_id,
                "Cannot supersede unknown scrape run"
            );
            return Err(Error::NotFound(format!("scrape run {run_id}")));
        }
        Ok(())
    }

    async fn list_runs(&self, source: &str, limit: i64) -> Result<Vec<ScrapeRun>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, source, status, started_at, finished_at, total_listings_scraped
            FROM scrape_runs
            WHERE source = $1
            ORDER BY started_at DESC, run_id DESC
            LIMIT $2
            "#,
        )
        .bind(source)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_run_row).collect()
    }
}
