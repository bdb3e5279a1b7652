//! # listmap-core
//!
//! Core types, traits, and the offline geocoder for listmap.
//!
//! This crate has no I/O. It provides:
//! - The bundled Czech [`Gazetteer`] and the [`Resolver`] cascade over it
//! - Listing snapshot models and change-flag derivation between versions
//! - The store traits implemented by `listmap-db`

pub mod defaults;
pub mod error;
pub mod gazetteer;
pub mod geocode;
pub mod logging;
pub mod models;
pub mod traits;
pub mod versioning;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use gazetteer::Gazetteer;
pub use geocode::{resolve_czech_location, Resolution, Resolver, Strategy};
pub use models::*;
pub use traits::*;
pub use versioning::VersionChain;
