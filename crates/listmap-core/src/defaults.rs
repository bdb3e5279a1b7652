//! Centralized default constants for listmap.
//!
//! Crates reference these instead of defining their own magic numbers.

// =============================================================================
// GEOCODING
// =============================================================================

/// City whose numbered districts ("Praha 5", "PRAHA12") fold into the city.
pub const CAPITAL_CITY: &str = "Praha";

/// Shortest gazetteer key considered by the substring scan.
///
/// Shorter keys would match inside unrelated words far too often.
pub const MIN_SUBSTRING_KEY_LEN: usize = 4;

// =============================================================================
// LISTINGS
// =============================================================================

/// Maximum rows returned by the map/list query.
pub const LISTING_PAGE_LIMIT: i64 = 5000;

/// Default number of versions returned by a listing history lookup.
pub const HISTORY_LIMIT: i64 = 10;

/// Default number of scrape runs returned per source.
pub const RUN_LIST_LIMIT: i64 = 10;

// =============================================================================
// BACKFILL
// =============================================================================

/// Scraper whose listings arrive without coordinates.
pub const BACKFILL_SOURCE: &str = "gfr";

/// Maximum unresolved location strings echoed in a run summary.
pub const SUMMARY_UNRESOLVED_LIMIT: usize = 50;
