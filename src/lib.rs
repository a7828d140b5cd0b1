//! Geo Incident - geofence matching for hazard zones with durable webhook delivery.
//!
//! A location check matches a user position against the active hazard zones.
//! When the user is inside one, a delivery task is queued and a background
//! worker POSTs it to the configured webhook, retrying until it succeeds or is
//! dead-lettered.

pub mod config;
pub mod geofence;
pub mod queue;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
pub mod webhook;
pub mod worker;
pub mod zones;

#[cfg(test)]
pub mod test_utils;
