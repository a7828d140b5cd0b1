//! Geometry validation for the API boundary.
//!
//! The matcher accepts any geometry and never repairs it. Zones written
//! through the API and locations submitted for checking are validated here
//! first, so malformed input is rejected with a precise reason instead of
//! producing surprising matches.

use thiserror::Error;

use crate::types::{Coord, Location, Polygon};

/// Minimum positions in a closed linear ring (a triangle plus the closing point).
pub const MIN_RING_POSITIONS: usize = 4;

/// Why a polygon or location was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon must have at least one ring")]
    NoRings,

    #[error("exterior ring has {found} positions, at least {MIN_RING_POSITIONS} required")]
    TooFewPositions { found: usize },

    #[error("exterior ring is not closed: first and last positions differ")]
    NotClosed,

    #[error("latitude {lat} out of range [-90, 90]")]
    LatitudeOutOfRange { lat: f64 },

    #[error("longitude {lon} out of range [-180, 180]")]
    LongitudeOutOfRange { lon: f64 },
}

pub type Result<T> = std::result::Result<T, GeometryError>;

fn check_coord(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeometryError::LatitudeOutOfRange { lat });
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeometryError::LongitudeOutOfRange { lon });
    }
    Ok(())
}

/// Checks that a location is a valid WGS84 coordinate.
///
/// NaN fails both range checks and is rejected as an out-of-range latitude.
pub fn validate_location(location: &Location) -> Result<()> {
    check_coord(location.lat, location.lon)
}

/// Checks that a polygon is usable as a zone boundary.
///
/// Every ring must be in range; only the exterior is checked for shape, since
/// holes never take part in matching.
pub fn validate_polygon(polygon: &Polygon) -> Result<()> {
    let exterior = polygon.exterior().ok_or(GeometryError::NoRings)?;

    if exterior.len() < MIN_RING_POSITIONS {
        return Err(GeometryError::TooFewPositions {
            found: exterior.len(),
        });
    }
    if !exterior.is_closed() {
        return Err(GeometryError::NotClosed);
    }

    polygon
        .coordinates
        .iter()
        .flat_map(|ring| ring.points())
        .try_for_each(|&Coord { lon, lat }| check_coord(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ring;

    fn square() -> Polygon {
        Polygon::from_exterior(&[
            (37.0, 55.0),
            (38.0, 55.0),
            (38.0, 56.0),
            (37.0, 56.0),
            (37.0, 55.0),
        ])
    }

    #[test]
    fn accepts_closed_square() {
        assert_eq!(validate_polygon(&square()), Ok(()));
    }

    #[test]
    fn rejects_polygon_without_rings() {
        assert_eq!(
            validate_polygon(&Polygon::new(vec![])),
            Err(GeometryError::NoRings)
        );
    }

    #[test]
    fn rejects_short_ring() {
        let poly = Polygon::from_exterior(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        assert_eq!(
            validate_polygon(&poly),
            Err(GeometryError::TooFewPositions { found: 3 })
        );
    }

    #[test]
    fn rejects_open_ring() {
        let poly = Polygon::from_exterior(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(validate_polygon(&poly), Err(GeometryError::NotClosed));
    }

    #[test]
    fn rejects_out_of_range_hole_coordinate() {
        let mut poly = square();
        poly.coordinates.push(Ring::from_pairs(&[
            (37.2, 55.2),
            (190.0, 55.2),
            (37.4, 55.4),
            (37.2, 55.2),
        ]));
        assert_eq!(
            validate_polygon(&poly),
            Err(GeometryError::LongitudeOutOfRange { lon: 190.0 })
        );
    }

    #[test]
    fn location_range_is_inclusive() {
        assert!(validate_location(&Location::new(90.0, -180.0)).is_ok());
        assert!(validate_location(&Location::new(-90.0, 180.0)).is_ok());
    }

    #[test]
    fn location_out_of_range() {
        assert!(matches!(
            validate_location(&Location::new(91.0, 0.0)),
            Err(GeometryError::LatitudeOutOfRange { .. })
        ));
        assert!(matches!(
            validate_location(&Location::new(0.0, -180.5)),
            Err(GeometryError::LongitudeOutOfRange { .. })
        ));
    }

    #[test]
    fn nan_is_rejected() {
        assert!(validate_location(&Location::new(f64::NAN, 0.0)).is_err());
    }
}
