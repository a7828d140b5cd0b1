//! Hazard zones and their GeoJSON polygon geometry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ZoneId;

/// A GeoJSON position. Serialized as `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Coord { lon, lat }
    }
}

impl From<[f64; 2]> for Coord {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Coord { lon, lat }
    }
}

impl From<Coord> for [f64; 2] {
    fn from(c: Coord) -> Self {
        [c.lon, c.lat]
    }
}

/// A linear ring: an ordered sequence of positions.
///
/// Rings are implicitly closed. A ring whose first and last positions differ
/// is malformed input; it is rejected by validation, never repaired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring(pub Vec<Coord>);

impl Ring {
    pub fn new(points: Vec<Coord>) -> Self {
        Ring(points)
    }

    /// Builds a ring from `(lon, lat)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Ring(pairs.iter().map(|&(lon, lat)| Coord::new(lon, lat)).collect())
    }

    pub fn points(&self) -> &[Coord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the first and last positions are identical.
    pub fn is_closed(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

/// The only GeoJSON geometry type zones may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    #[default]
    Polygon,
}

/// A GeoJSON polygon.
///
/// Ring 0 is the exterior boundary. Any further rings are holes, which the
/// matcher does not subtract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    #[serde(rename = "type", default)]
    pub kind: GeometryKind,
    pub coordinates: Vec<Ring>,
}

impl Polygon {
    pub fn new(rings: Vec<Ring>) -> Self {
        Polygon {
            kind: GeometryKind::Polygon,
            coordinates: rings,
        }
    }

    /// Builds a polygon with a single exterior ring from `(lon, lat)` pairs.
    pub fn from_exterior(pairs: &[(f64, f64)]) -> Self {
        Polygon::new(vec![Ring::from_pairs(pairs)])
    }

    pub fn exterior(&self) -> Option<&Ring> {
        self.coordinates.first()
    }

    pub fn holes(&self) -> &[Ring] {
        self.coordinates.get(1..).unwrap_or(&[])
    }
}

/// A named polygonal hazard area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardZone {
    pub id: ZoneId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub area: Polygon,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HazardZone {
    /// Creates a new active zone stamped with the current time.
    pub fn new(name: impl Into<String>, description: impl Into<String>, area: Polygon) -> Self {
        let now = Utc::now();
        HazardZone {
            id: ZoneId::generate(),
            name: name.into(),
            description: description.into(),
            area,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> ZoneSummary {
        ZoneSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// What a location check reports for each matched zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub id: ZoneId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Fields supplied when creating a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewZone {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub area: Polygon,
}

impl NewZone {
    pub fn into_zone(self) -> HazardZone {
        HazardZone::new(self.name, self.description, self.area)
    }
}

/// A partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub area: Option<Polygon>,
}

impl ZoneUpdate {
    /// Applies the update to `zone` and bumps `updated_at`.
    pub fn apply(self, zone: &mut HazardZone) {
        if let Some(name) = self.name {
            zone.name = name;
        }
        if let Some(description) = self.description {
            zone.description = description;
        }
        if let Some(area) = self.area {
            zone.area = area;
        }
        zone.updated_at = Utc::now();
    }
}

/// Distinct users seen inside one zone during the stats window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub incident_id: ZoneId,
    pub name: String,
    pub user_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn polygon_deserializes_from_geojson() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[37.0, 55.0], [38.0, 55.0], [38.0, 56.0], [37.0, 56.0], [37.0, 55.0]]]
        });

        let polygon: Polygon = serde_json::from_value(value).unwrap();
        let exterior = polygon.exterior().unwrap();
        assert_eq!(exterior.len(), 5);
        assert_eq!(exterior.points()[1], Coord::new(38.0, 55.0));
        assert!(exterior.is_closed());
        assert!(polygon.holes().is_empty());
    }

    #[test]
    fn polygon_rejects_other_geometry_types() {
        let value = json!({ "type": "Point", "coordinates": [] });
        assert!(serde_json::from_value::<Polygon>(value).is_err());
    }

    #[test]
    fn coord_serializes_lon_first() {
        let json = serde_json::to_value(Coord::new(37.5, 55.5)).unwrap();
        assert_eq!(json, json!([37.5, 55.5]));
    }

    #[test]
    fn open_ring_is_not_closed() {
        let ring = Ring::from_pairs(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert!(!ring.is_closed());
        assert!(!Ring::default().is_closed());
    }

    #[test]
    fn second_ring_is_a_hole() {
        let polygon = Polygon::new(vec![
            Ring::from_pairs(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            Ring::from_pairs(&[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)]),
        ]);
        assert_eq!(polygon.holes().len(), 1);
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let mut zone = HazardZone::new("Flood", "river", Polygon::default());
        let before = zone.updated_at;
        ZoneUpdate {
            name: Some("Big flood".to_string()),
            ..Default::default()
        }
        .apply(&mut zone);

        assert_eq!(zone.name, "Big flood");
        assert_eq!(zone.description, "river");
        assert!(zone.updated_at >= before);
    }

    #[test]
    fn new_zone_is_active() {
        let zone = NewZone {
            name: "Fire".to_string(),
            description: String::new(),
            area: Polygon::default(),
        }
        .into_zone();
        assert!(zone.is_active);
        assert_eq!(zone.created_at, zone.updated_at);
    }

    #[test]
    fn empty_description_is_omitted() {
        let zone = HazardZone::new("Flood", "", Polygon::default());
        let json = serde_json::to_value(&zone).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["area"]["type"], "Polygon");
    }
}
