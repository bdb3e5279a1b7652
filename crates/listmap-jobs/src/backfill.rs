//! Coordinate backfill for listings stored without coordinates.
//!
//! The driver walks the distinct location strings of a source's rows that
//! still lack coordinates, resolves each through the offline [`Resolver`] and
//! writes the result to every matching row. Writes only ever touch rows whose
//! coordinates are still null, so repeated or concurrent runs are harmless.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use listmap_core::defaults::{BACKFILL_SOURCE, SUMMARY_UNRESOLVED_LIMIT};
use listmap_core::{BackfillStore, Error, Resolver, Result};

/// Configuration for a backfill run.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Source whose listings are backfilled.
    pub source: String,
    /// Resolve and report without writing.
    pub dry_run: bool,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            source: BACKFILL_SOURCE.to_string(),
            dry_run: false,
        }
    }
}

impl BackfillConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BACKFILL_SOURCE` | `gfr` | Source to backfill |
    /// | `BACKFILL_DRY_RUN` | `false` | Resolve without writing |
    ///
    /// A `BACKFILL_DRY_RUN` that is not a boolean is a `Config` error.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source = var("BACKFILL_SOURCE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| BACKFILL_SOURCE.to_string());

        let dry_run = match var("BACKFILL_DRY_RUN") {
            Some(v) => parse_flag(&v).ok_or_else(|| {
                Error::Config(format!(
                    "BACKFILL_DRY_RUN must be true or false, got {v:?}"
                ))
            })?,
            None => false,
        };

        Ok(Self { source, dry_run })
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None,
    }
}

/// Tally of one backfill run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillSummary {
    pub source: String,
    /// Distinct location strings considered.
    pub distinct_locations: usize,
    /// Locations the resolver matched.
    pub resolved: usize,
    /// Locations the resolver could not match.
    pub unresolved: usize,
    /// Locations whose update failed.
    pub failed: usize,
    pub rows_updated: u64,
    /// Rows without coordinates and without a usable location.
    pub skipped_empty_location: i64,
    /// Rows of the source still without coordinates after the run.
    pub remaining_missing: i64,
    /// All rows of the source.
    pub total_listings: i64,
    /// The run was cancelled before every location was processed.
    pub aborted: bool,
    pub dry_run: bool,
    pub unresolved_locations: Vec<String>,
    pub duration: Duration,
}

impl BackfillSummary {
    fn new(source: &str, dry_run: bool) -> Self {
        Self {
            source: source.to_string(),
            dry_run,
            ..Default::default()
        }
    }

    /// Rows of the source that have coordinates.
    pub fn with_coordinates(&self) -> i64 {
        self.total_listings - self.remaining_missing
    }

    fn processed(&self) -> usize {
        self.resolved + self.unresolved + self.failed
    }
}

impl fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backfill of '{}': {} distinct locations without coordinates",
            self.source, self.distinct_locations
        )?;
        if self.dry_run {
            write!(f, " (dry run, nothing written)")?;
        }
        if self.aborted {
            write!(f, " (aborted)")?;
        }
        writeln!(f)?;
        writeln!(f, "  Locations geocoded: {}", self.resolved)?;
        writeln!(f, "  Locations not matched: {}", self.unresolved)?;
        if self.failed > 0 {
            writeln!(f, "  Locations failed: {}", self.failed)?;
        }
        writeln!(f, "  Total rows updated: {}", self.rows_updated)?;
        writeln!(
            f,
            "  Rows with empty/null location (skipped): {}",
            self.skipped_empty_location
        )?;
        writeln!(
            f,
            "  Listings with coordinates: {} / {}",
            self.with_coordinates(),
            self.total_listings
        )?;
        write!(
            f,
            "  Listings still missing coordinates: {}",
            self.remaining_missing
        )?;

        if !self.unresolved_locations.is_empty() {
            write!(f, "\n  Unmatched locations:")?;
            for location in self.unresolved_locations.iter().take(SUMMARY_UNRESOLVED_LIMIT) {
                write!(f, "\n    {location:?}")?;
            }
            let hidden = self
                .unresolved_locations
                .len()
                .saturating_sub(SUMMARY_UNRESOLVED_LIMIT);
            if hidden > 0 {
                write!(f, "\n    ... and {hidden} more")?;
            }
        }
        Ok(())
    }
}

/// Runs the coordinate backfill against a store.
pub struct BackfillDriver<'r, S> {
    store: Arc<S>,
    resolver: &'r Resolver<'r>,
    dry_run: bool,
}

impl<S: BackfillStore> BackfillDriver<'static, S> {
    /// Driver over the bundled Czech gazetteer.
    pub fn czech(store: Arc<S>) -> Self {
        Self::new(store, Resolver::czech())
    }
}

impl<'r, S: BackfillStore> BackfillDriver<'r, S> {
    pub fn new(store: Arc<S>, resolver: &'r Resolver<'r>) -> Self {
        Self {
            store,
            resolver,
            dry_run: false,
        }
    }

    /// Resolve and report without writing.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Backfill every unresolved location of `source`.
    pub async fn run(&self, source: &str) -> Result<BackfillSummary> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_until_cancelled(source, &cancel_rx).await
    }

    /// Backfill `source`, stopping before the next location once `cancel`
    /// holds `true`. Updates already written stay written.
    #[instrument(
        skip(self, cancel),
        fields(subsystem = "jobs", component = "backfill", op = "run", dry_run = self.dry_run)
    )]
    pub async fn run_until_cancelled(
        &self,
        source: &str,
        cancel: &watch::Receiver<bool>,
    ) -> Result<BackfillSummary> {
        let start = Instant::now();
        let mut summary = BackfillSummary::new(source, self.dry_run);

        let locations = self
            .store
            .distinct_unresolved_locations(source)
            .await
            .inspect_err(|e| {
                error!(error = %e, "Failed to list locations without coordinates");
            })?;
        summary.distinct_locations = locations.len();

        info!(
            distinct_locations = locations.len(),
            "Found distinct locations without coordinates"
        );

        for location in &locations {
            if *cancel.borrow() {
                warn!(
                    remaining = locations.len() - summary.processed(),
                    "Backfill cancelled"
                );
                summary.aborted = true;
                break;
            }
            self.process_location(source, location, &mut summary).await;
        }

        match self.store.coverage(source).await {
            Ok(coverage) => {
                summary.skipped_empty_location = coverage.missing_location;
                summary.remaining_missing = coverage.missing_coordinates;
                summary.total_listings = coverage.total;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read coordinate coverage");
            }
        }

        summary.duration = start.elapsed();
        info!(
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            failed = summary.failed,
            rows_affected = summary.rows_updated,
            remaining_missing = summary.remaining_missing,
            aborted = summary.aborted,
            duration_ms = summary.duration.as_millis() as u64,
            "Backfill finished"
        );
        Ok(summary)
    }

    async fn process_location(&self, source: &str, location: &str, summary: &mut BackfillSummary) {
        let Some(resolution) = self.resolver.resolve_detailed(location) else {
            debug!(location, "No gazetteer match");
            summary.unresolved += 1;
            summary.unresolved_locations.push(location.to_string());
            return;
        };

        if self.dry_run {
            debug!(
                location,
                strategy = %resolution.strategy,
                matched = %resolution.matched_key,
                "Resolved (dry run)"
            );
            summary.resolved += 1;
            return;
        }

        match self
            .store
            .resolve_location(source, location, resolution.coordinates)
            .await
        {
            Ok(rows) => {
                debug!(
                    location,
                    strategy = %resolution.strategy,
                    matched = %resolution.matched_key,
                    coordinates = %resolution.coordinates,
                    rows_affected = rows,
                    "Resolved"
                );
                summary.resolved += 1;
                summary.rows_updated += rows;
            }
            Err(e) => {
                warn!(location, error = %e, "Failed to store coordinates");
                summary.failed += 1;
            }
        }
    }
}
