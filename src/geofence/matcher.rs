//! Even-odd ray casting.
//!
//! A horizontal ray is cast from the point towards +lon and every ring edge it
//! crosses flips membership. Points exactly on an edge or vertex land on
//! whichever side the floating-point comparisons put them; callers must not
//! rely on boundary membership.

use crate::types::{Coord, HazardZone, Location, Polygon, Ring, ZoneSummary};

impl Ring {
    /// Returns whether `point` lies inside this ring under the even-odd rule.
    ///
    /// An empty ring contains nothing.
    pub fn contains(&self, point: Coord) -> bool {
        let pts = self.points();
        let Some(mut prev) = pts.last() else {
            return false;
        };

        let mut inside = false;
        for cur in pts {
            if (cur.lat > point.lat) != (prev.lat > point.lat) {
                let cross_lon =
                    (prev.lon - cur.lon) * (point.lat - cur.lat) / (prev.lat - cur.lat) + cur.lon;
                if point.lon < cross_lon {
                    inside = !inside;
                }
            }
            prev = cur;
        }
        inside
    }
}

impl Polygon {
    /// Returns whether `point` lies inside the exterior ring.
    ///
    /// Holes are not subtracted. A polygon with no rings contains nothing.
    pub fn contains(&self, point: Coord) -> bool {
        self.exterior().is_some_and(|ring| ring.contains(point))
    }
}

/// Returns every zone whose area contains `location`, in input order.
///
/// The first entry is the primary match. The `is_active` flag is not
/// consulted here; callers decide which zones to pass in.
pub fn match_zones(location: Location, zones: &[HazardZone]) -> Vec<ZoneSummary> {
    let point = Coord::from(location);
    zones
        .iter()
        .filter(|zone| zone.area.contains(point))
        .map(HazardZone::summary)
        .collect()
}
