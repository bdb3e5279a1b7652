//! Core data models for listmap.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Error;

// =============================================================================
// COORDINATES
// =============================================================================

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a pair of nullable columns; both must be present.
    pub fn from_columns(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lat, self.lng)
    }
}

// =============================================================================
// LISTING SNAPSHOTS
// =============================================================================

/// Logical identity of a listing across scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingKey {
    /// Scraper name the listing came from.
    pub source: String,
    pub url: String,
}

impl ListingKey {
    pub fn new(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.url)
    }
}

/// One immutable scrape of one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub id: Uuid,
    pub source: String,
    pub url: String,
    /// Run this snapshot was scraped in; orders snapshots of the same listing.
    pub run_id: i64,
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub price_text: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub location: Option<String>,
    pub views: Option<i64>,
    /// Posting date as printed on the marketplace.
    pub posted_on: Option<String>,
    pub is_top: Option<bool>,
    pub image_url: Option<String>,
    pub images: Option<JsonValue>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub scraped_at: DateTime<Utc>,
}

impl ListingSnapshot {
    pub fn key(&self) -> ListingKey {
        ListingKey::new(self.source.clone(), self.url.clone())
    }
}

/// Request for appending a new snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub source: String,
    pub url: String,
    pub run_id: i64,
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub price_text: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub location: Option<String>,
    pub views: Option<i64>,
    pub posted_on: Option<String>,
    pub is_top: Option<bool>,
    pub image_url: Option<String>,
    pub images: Option<JsonValue>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Defaults to the insertion time when absent.
    pub scraped_at: Option<DateTime<Utc>>,
}

impl NewSnapshot {
    /// Minimal snapshot for a listing key in a given run.
    pub fn new(source: impl Into<String>, url: impl Into<String>, run_id: i64) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            run_id,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_views(mut self, views: i64) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_top(mut self, is_top: bool) -> Self {
        self.is_top = Some(is_top);
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_scraped_at(mut self, scraped_at: DateTime<Utc>) -> Self {
        self.scraped_at = Some(scraped_at);
        self
    }

    /// Materialise into a stored snapshot with the given id.
    pub fn into_snapshot(self, id: Uuid, now: DateTime<Utc>) -> ListingSnapshot {
        ListingSnapshot {
            id,
            source: self.source,
            url: self.url,
            run_id: self.run_id,
            title: self.title,
            category: self.category,
            price: self.price,
            price_text: self.price_text,
            description: self.description,
            full_description: self.full_description,
            location: self.location,
            views: self.views,
            posted_on: self.posted_on,
            is_top: self.is_top,
            image_url: self.image_url,
            images: self.images,
            contact_name: self.contact_name,
            phone: self.phone,
            coordinates: self.coordinates,
            scraped_at: self.scraped_at.unwrap_or(now),
        }
    }
}

// =============================================================================
// CHANGE DETECTION
// =============================================================================

/// Field changes between a snapshot and the one scraped immediately before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFlags {
    pub price_changed: bool,
    pub description_changed: bool,
    pub title_changed: bool,
    pub top_status_changed: bool,
    /// Always false: view counters move on every scrape.
    pub views_changed: bool,
}

impl ChangeFlags {
    pub fn any(&self) -> bool {
        self.price_changed || self.description_changed || self.title_changed || self.top_status_changed
    }
}

/// Latest snapshot of a listing with its change flags and version count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingWithChanges {
    #[serde(flatten)]
    pub snapshot: ListingSnapshot,
    #[serde(flatten)]
    pub changes: ChangeFlags,
    pub total_versions: i64,
}

/// One entry of a listing's version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingVersion {
    /// 1 is the newest version.
    pub version_number: i64,
    #[serde(flatten)]
    pub snapshot: ListingSnapshot,
}

// =============================================================================
// LISTING QUERIES
// =============================================================================

/// Filters for the map/list query over latest geocoded listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Inclusive lower price bound.
    pub price_min: Option<i64>,
    /// Inclusive upper price bound.
    pub price_max: Option<i64>,
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    pub source: Option<String>,
    /// Maximum rows (defaults to `defaults::LISTING_PAGE_LIMIT`).
    pub limit: Option<i64>,
}

/// Aggregate statistics over latest geocoded listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingStats {
    pub total_listings: i64,
    pub total_categories: i64,
    pub avg_price: Option<f64>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub top_listings: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

/// How many rows of a source carry coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateCoverage {
    pub total: i64,
    pub with_coordinates: i64,
    pub missing_coordinates: i64,
    /// Rows missing coordinates whose location is null or empty.
    pub missing_location: i64,
}

// =============================================================================
// SCRAPE RUNS
// =============================================================================

/// Lifecycle status of a scrape run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
    /// Replaced by a later re-run; its snapshots never become latest.
    Superseded,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
            RunStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The actor API reports upper-case statuses ("SUCCEEDED", "TIMED-OUT").
        match s.to_ascii_lowercase().as_str() {
            "running" | "ready" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" | "timed-out" | "timed_out" => Ok(RunStatus::Failed),
            "aborted" | "aborting" => Ok(RunStatus::Aborted),
            "superseded" => Ok(RunStatus::Superseded),
            other => Err(Error::InvalidInput(format!("unknown run status: {other}"))),
        }
    }
}

/// A scrape run of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub run_id: i64,
    pub source: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_listings_scraped: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_from_columns_requires_both() {
        assert_eq!(
            Coordinates::from_columns(Some(50.0755), Some(14.4378)),
            Some(Coordinates::new(50.0755, 14.4378))
        );
        assert_eq!(Coordinates::from_columns(Some(50.0755), None), None);
        assert_eq!(Coordinates::from_columns(None, Some(14.4378)), None);
    }

    #[test]
    fn test_coordinates_display() {
        assert_eq!(
            Coordinates::new(49.1951, 16.6068).to_string(),
            "[49.1951, 16.6068]"
        );
    }

    #[test]
    fn test_run_status_round_trip_through_str() {
        for status in [
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Aborted,
            RunStatus::Superseded,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_run_status_accepts_actor_api_spelling() {
        assert_eq!("SUCCEEDED".parse::<RunStatus>().unwrap(), RunStatus::Succeeded);
        assert_eq!("TIMED-OUT".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert_eq!("READY".parse::<RunStatus>().unwrap(), RunStatus::Running);
        assert!("exploded".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_new_snapshot_defaults_scraped_at_to_now() {
        let now = Utc::now();
        let snapshot = NewSnapshot::new("gfr", "https://example.cz/a", 7)
            .with_price(1000)
            .into_snapshot(Uuid::nil(), now);
        assert_eq!(snapshot.scraped_at, now);
        assert_eq!(snapshot.run_id, 7);
        assert_eq!(snapshot.price, Some(1000));
        assert_eq!(snapshot.key(), ListingKey::new("gfr", "https://example.cz/a"));
    }

    #[test]
    fn test_change_flags_any_ignores_views() {
        let flags = ChangeFlags {
            views_changed: true,
            ..Default::default()
        };
        assert!(!flags.any());
        let flags = ChangeFlags {
            title_changed: true,
            ..Default::default()
        };
        assert!(flags.any());
    }

    #[test]
    fn test_listing_with_changes_serializes_flat() {
        let snapshot = NewSnapshot::new("bazos", "https://example.cz/b", 1)
            .with_title("Kolo")
            .into_snapshot(Uuid::nil(), Utc::now());
        let listing = ListingWithChanges {
            snapshot,
            changes: ChangeFlags {
                price_changed: true,
                ..Default::default()
            },
            total_versions: 2,
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["title"], "Kolo");
        assert_eq!(json["price_changed"], true);
        assert_eq!(json["views_changed"], false);
        assert_eq!(json["total_versions"], 2);
    }
}
