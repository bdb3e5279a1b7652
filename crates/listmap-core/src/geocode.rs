//! Offline geocoding of free-text Czech listing locations.
//!
//! [`Resolver::resolve`] runs a fixed cascade of strategies against a
//! [`Gazetteer`] and stops at the first hit:
//!
//! 1. direct match (exact, then case-insensitive in gazetteer order)
//! 2. numbered district of the capital ("Praha 5", "PRAHA12")
//! 3. "City - District" compound, left segment matched directly
//! 4. comma-separated address, each part matched directly with and without
//!    a trailing house number
//! 5. longest gazetteer key (at least four characters) contained in the input
//!
//! The resolver is pure and total: any input yields coordinates or `None`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defaults::{CAPITAL_CITY, MIN_SUBSTRING_KEY_LEN};
use crate::gazetteer::Gazetteer;
use crate::models::Coordinates;

/// Trailing house number: " 12", " 12a", " 1234/5", " 7b/12".
static HOUSE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[0-9]+[a-zA-Z]?(/[0-9]+)?$").expect("valid regex"));

static CZECH_RESOLVER: Lazy<Resolver<'static>> = Lazy::new(|| Resolver::new(Gazetteer::czech()));

/// Which step of the cascade produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    NumberedDistrict,
    DashCompound,
    CommaAddress,
    Substring,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::NumberedDistrict => "numbered_district",
            Strategy::DashCompound => "dash_compound",
            Strategy::CommaAddress => "comma_address",
            Strategy::Substring => "substring",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful resolution with the gazetteer key that matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub coordinates: Coordinates,
    pub matched_key: String,
    pub strategy: Strategy,
}

/// Gazetteer key prepared for case-insensitive scans.
#[derive(Debug, Clone)]
struct FoldedKey {
    lower: String,
    char_len: usize,
}

/// Location string → coordinates resolver over a gazetteer.
#[derive(Debug, Clone)]
pub struct Resolver<'g> {
    gazetteer: &'g Gazetteer,
    folded: Vec<FoldedKey>,
    capital: String,
    district_pattern: Regex,
}

impl<'g> Resolver<'g> {
    /// Resolver with the default capital city.
    pub fn new(gazetteer: &'g Gazetteer) -> Self {
        Self::with_capital(gazetteer, CAPITAL_CITY)
    }

    /// Resolver whose numbered-district rule targets `capital`.
    ///
    /// The rule only fires when `capital` itself is a gazetteer key.
    pub fn with_capital(gazetteer: &'g Gazetteer, capital: &str) -> Self {
        let folded = gazetteer
            .entries()
            .map(|(name, _)| FoldedKey {
                lower: name.to_lowercase(),
                char_len: name.chars().count(),
            })
            .collect();
        let district_pattern = Regex::new(&format!(r"(?i)^{}\s*[0-9]+", regex::escape(capital)))
            .expect("escaped capital is a valid pattern");

        Self {
            gazetteer,
            folded,
            capital: capital.to_string(),
            district_pattern,
        }
    }

    /// Shared resolver over the bundled Czech gazetteer.
    pub fn czech() -> &'static Resolver<'static> {
        &CZECH_RESOLVER
    }

    pub fn gazetteer(&self) -> &'g Gazetteer {
        self.gazetteer
    }

    /// Resolve a location string to coordinates.
    pub fn resolve(&self, raw: &str) -> Option<Coordinates> {
        self.resolve_detailed(raw).map(|r| r.coordinates)
    }

    /// Resolve a location string, reporting the key and strategy that matched.
    pub fn resolve_detailed(&self, raw: &str) -> Option<Resolution> {
        let name = raw.trim();
        if name.is_empty() {
            return None;
        }

        if let Some((key, coordinates)) = self.direct(name) {
            return Some(hit(key, coordinates, Strategy::Direct));
        }

        if self.district_pattern.is_match(name) {
            if let Some(coordinates) = self.gazetteer.lookup(&self.capital) {
                return Some(hit(&self.capital, coordinates, Strategy::NumberedDistrict));
            }
        }

        if let Some((head, _)) = name.split_once(" - ") {
            if let Some((key, coordinates)) = self.direct(head.trim()) {
                return Some(hit(key, coordinates, Strategy::DashCompound));
            }
        }

        if name.contains(',') {
            for part in name.split(',').map(str::trim) {
                if let Some((key, coordinates)) = self.direct(part) {
                    return Some(hit(key, coordinates, Strategy::CommaAddress));
                }
                let cleaned = HOUSE_NUMBER.replace(part, "");
                let cleaned = cleaned.trim();
                if cleaned != part {
                    if let Some((key, coordinates)) = self.direct(cleaned) {
                        return Some(hit(key, coordinates, Strategy::CommaAddress));
                    }
                }
            }
        }

        self.longest_contained(name)
            .map(|(key, coordinates)| hit(key, coordinates, Strategy::Substring))
    }

    /// Exact lookup, then the first case-insensitive key in gazetteer order.
    fn direct(&self, name: &str) -> Option<(&'g str, Coordinates)> {
        if let Some(entry) = self.gazetteer.get_key_value(name) {
            return Some(entry);
        }
        let lower = name.to_lowercase();
        self.gazetteer
            .entries()
            .zip(&self.folded)
            .find(|(_, folded)| folded.lower == lower)
            .map(|(entry, _)| entry)
    }

    /// Longest key of sufficient length contained in `name`; ties go to the
    /// earlier gazetteer entry.
    fn longest_contained(&self, name: &str) -> Option<(&'g str, Coordinates)> {
        let lower = name.to_lowercase();
        let mut best: Option<((&'g str, Coordinates), usize)> = None;
        for (entry, folded) in self.gazetteer.entries().zip(&self.folded) {
            if folded.char_len < MIN_SUBSTRING_KEY_LEN || !lower.contains(&folded.lower) {
                continue;
            }
            if best.map_or(true, |(_, len)| folded.char_len > len) {
                best = Some((entry, folded.char_len));
            }
        }
        best.map(|(entry, _)| entry)
    }
}

fn hit(key: &str, coordinates: Coordinates, strategy: Strategy) -> Resolution {
    Resolution {
        coordinates,
        matched_key: key.to_string(),
        strategy,
    }
}

/// Resolve against the bundled Czech gazetteer.
pub fn resolve_czech_location(raw: &str) -> Option<Coordinates> {
    Resolver::czech().resolve(raw)
}
