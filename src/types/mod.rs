//! Core domain types: identifiers, hazard zones, location checks and
//! delivery tasks.

pub mod ids;
pub mod location;
pub mod task;
pub mod zone;

pub use ids::{TaskId, ZoneId};
pub use location::{CheckLocationRequest, CheckLocationResponse, Location, LocationCheck};
pub use task::{DeliveryTask, WebhookPayload};
pub use zone::{
    Coord, GeometryKind, HazardZone, NewZone, Polygon, Ring, ZoneStats, ZoneSummary, ZoneUpdate,
};
