//! # listmap-jobs
//!
//! Batch jobs for listmap.
//!
//! This crate provides:
//! - The coordinate backfill driver and its run summary
//! - Environment-driven backfill configuration
//! - Cooperative cancellation via a `tokio::sync::watch` flag
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use listmap_db::Database;
//! use listmap_jobs::BackfillDriver;
//!
//! let db = Database::connect("postgres://...").await?;
//! let driver = BackfillDriver::czech(Arc::new(db.listings.clone()));
//! let summary = driver.run("gfr").await?;
//! println!("{summary}");
//! ```

pub mod backfill;

// Re-export core types
pub use listmap_core::*;

pub use backfill::{BackfillConfig, BackfillDriver, BackfillSummary};
