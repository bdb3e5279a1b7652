//! Structured logging field names shared by every listmap crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Run aborted, requires operator attention |
//! | WARN  | Per-item failure, batch continues |
//! | INFO  | Lifecycle events (startup, run start/finish, summary) |
//! | DEBUG | Decision points (which strategy resolved a location) |
//! | TRACE | Per-row, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "database", "geocode", "jobs", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "listings", "runs", "backfill"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "resolve", "set_coordinates", "list_latest"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Scraper name a listing belongs to.
pub const SOURCE: &str = "source";

/// Listing URL (logical key together with source).
pub const URL: &str = "url";

/// Scrape run identifier.
pub const RUN_ID: &str = "run_id";

/// Free-text location string being geocoded.
pub const LOCATION: &str = "location";

/// Resolver strategy that produced a match.
pub const STRATEGY: &str = "strategy";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows changed by a write.
pub const ROWS_AFFECTED: &str = "rows_affected";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
