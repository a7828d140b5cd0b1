//! Shared test utilities and arbitrary generators for property-based testing.

use proptest::prelude::*;

use crate::types::{Coord, DeliveryTask, HazardZone, Polygon, ZoneId};

pub fn arb_coord() -> impl Strategy<Value = Coord> {
    (-180.0f64..=180.0, -90.0f64..=90.0).prop_map(|(lon, lat)| Coord::new(lon, lat))
}

/// An axis-aligned box `(min_lon, min_lat, max_lon, max_lat)` with non-trivial extent.
pub fn arb_rectangle() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (-170.0f64..160.0, -80.0f64..70.0, 0.5f64..10.0, 0.5f64..10.0)
        .prop_map(|(lon, lat, w, h)| (lon, lat, lon + w, lat + h))
}

pub fn arb_user_id() -> impl Strategy<Value = String> {
    "[a-z0-9-]{1,24}".prop_map(String::from)
}

pub fn arb_delivery_task() -> impl Strategy<Value = DeliveryTask> {
    ("[A-Za-z ]{1,30}", arb_user_id(), 0u32..10).prop_map(|(name, user, retries)| {
        let mut task = DeliveryTask::new(name, user, ZoneId::generate());
        task.retry_count = retries;
        task
    })
}

/// A square zone of side `size` degrees with its south-west corner at `(lon, lat)`.
pub fn square_zone(name: &str, lon: f64, lat: f64, size: f64) -> HazardZone {
    HazardZone::new(
        name,
        format!("{name} test zone"),
        Polygon::from_exterior(&[
            (lon, lat),
            (lon + size, lat),
            (lon + size, lat + size),
            (lon, lat + size),
            (lon, lat),
        ]),
    )
}
