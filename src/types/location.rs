//! Location checks: the request, the response and the record kept per check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::ZoneId;
use super::zone::{Coord, ZoneSummary};

/// A WGS84 point, latitude first as the API sends it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Location { lat, lon }
    }
}

impl From<Location> for Coord {
    fn from(loc: Location) -> Self {
        Coord::new(loc.lon, loc.lat)
    }
}

/// Body of `POST /api/v1/location/check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckLocationRequest {
    pub user_id: String,
    pub user_location: Location,
}

/// Answer to a location check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLocationResponse {
    pub is_danger: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incidents: Vec<ZoneSummary>,
}

/// One recorded location check, as handed to the check sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCheck {
    pub id: Uuid,
    pub user_id: String,
    pub location: Location,
    pub is_danger: bool,
    /// The primary match, if any.
    pub zone_id: Option<ZoneId>,
    pub created_at: DateTime<Utc>,
}

impl LocationCheck {
    pub fn new(user_id: impl Into<String>, location: Location, zone_id: Option<ZoneId>) -> Self {
        LocationCheck {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            location,
            is_danger: zone_id.is_some(),
            zone_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_api_shape() {
        let req: CheckLocationRequest = serde_json::from_value(json!({
            "user_id": "u-1",
            "user_location": { "lat": 55.75, "lon": 37.61 }
        }))
        .unwrap();
        assert_eq!(req.user_location, Location::new(55.75, 37.61));
    }

    #[test]
    fn safe_response_omits_incidents() {
        let resp = CheckLocationResponse {
            is_danger: false,
            incidents: vec![],
        };
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({ "is_danger": false }));
    }

    #[test]
    fn location_converts_to_lon_lat_coord() {
        let coord: Coord = Location::new(10.0, 20.0).into();
        assert_eq!(coord, Coord::new(20.0, 10.0));
    }

    #[test]
    fn check_is_danger_follows_zone() {
        let safe = LocationCheck::new("u", Location::new(0.0, 0.0), None);
        assert!(!safe.is_danger);
        let hit = LocationCheck::new("u", Location::new(0.0, 0.0), Some(ZoneId::generate()));
        assert!(hit.is_danger);
    }
}
