//! PostgreSQL pool construction for the listing store.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use listmap_core::{Error, Result};

/// The backfill issues one statement at a time, so a small pool suffices.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Sizing and timeouts of a listing store pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long acquiring a connection may wait.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `DB_MAX_CONNECTIONS` and
    /// `DB_CONNECT_TIMEOUT_SECS`. Unparsable values are a `Config` error.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(n) = parse_var::<u32>(&var, "DB_MAX_CONNECTIONS")? {
            config.max_connections = n.max(1);
            config.min_connections = config.min_connections.min(config.max_connections);
        }
        if let Some(secs) = parse_var::<u64>(&var, "DB_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got {raw:?}"))),
        None => Ok(None),
    }
}

/// Pool over `database_url` with default sizing.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(database_url).map_err(Error::Database)?;
    create_pool_with_options(options, config).await
}

/// Pool over prepared connect options, e.g. with a session `search_path`.
pub async fn create_pool_with_options(
    options: PgConnectOptions,
    config: PoolConfig,
) -> Result<PgPool> {
    let start = Instant::now();
    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Connecting to listing store"
    );

    let pool = config
        .pool_options()
        .connect_with(options)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Listing store connected"
    );
    Ok(pool)
}

/// Log pool occupancy; warns when every connection is busy.
pub fn log_pool_metrics(pool: &PgPool) {
    let (size, idle) = (pool.size(), pool.num_idle());
    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool occupancy"
    );
    if size > 0 && idle == 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "No idle connections left"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_from_vars_without_overrides_is_default() {
        assert_eq!(PoolConfig::from_vars(vars(&[])).unwrap(), PoolConfig::default());
    }

    #[test]
    fn test_from_vars_applies_overrides() {
        let config = PoolConfig::from_vars(vars(&[
            ("DB_MAX_CONNECTIONS", "12"),
            ("DB_CONNECT_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS));
    }

    #[test]
    fn test_zero_max_connections_keeps_one() {
        let config = PoolConfig::from_vars(vars(&[("DB_MAX_CONNECTIONS", "0")])).unwrap();
        assert_eq!(config.max_connections, 1);
        assert!(config.min_connections <= config.max_connections);
    }

    #[test]
    fn test_malformed_override_is_config_error() {
        let err = PoolConfig::from_vars(vars(&[("DB_MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("DB_MAX_CONNECTIONS")));
    }

    #[tokio::test]
    async fn test_invalid_url_is_database_error() {
        let err = create_pool("not a url").await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
