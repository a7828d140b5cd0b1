//! Point-in-polygon matching against hazard zones.
//!
//! Matching is pure and infallible. Input geometry is checked separately by
//! [`validation`] at the API boundary; the matcher never repairs a ring.

pub mod matcher;
pub mod validation;

pub use matcher::match_zones;
pub use validation::{GeometryError, validate_location, validate_polygon};
