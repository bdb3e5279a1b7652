//! # listmap-db
//!
//! Storage layer for listmap.
//!
//! This crate provides:
//! - Connection pool management
//! - The PostgreSQL listing version store and scrape run bookkeeping
//! - An in-memory store with identical semantics for tests and dry runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use listmap_db::{Database, ListingStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/listmap").await?;
//!     let latest = db.listings.latest("gfr", "https://www.gfr.cz/aukce/1").await?;
//!     println!("{latest:?}");
//!     Ok(())
//! }
//! ```
pub mod listings;
pub mod memory;
pub mod pool;
pub mod runs;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use listmap_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use listings::PgListingRepository;
pub use memory::MemoryListingStore;
pub use pool::{
    create_pool, create_pool_with_config, create_pool_with_options, log_pool_metrics, PoolConfig,
};
pub use runs::PgRunRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Listing snapshots, change flags and coordinate backfill.
    pub listings: PgListingRepository,
    /// Scrape run bookkeeping.
    pub runs: PgRunRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            listings: PgListingRepository::new(pool.clone()),
            runs: PgRunRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("Praha_9"), "Praha\\_9");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("Kolín"), "Kolín");
    }
}
