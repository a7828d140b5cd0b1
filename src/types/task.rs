//! Delivery tasks and the webhook payload built from them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TaskId, ZoneId};

/// A durable unit of webhook work.
///
/// Persisted as JSON with exactly these field names. `retry_count` starts at
/// zero and only the delivery worker increments it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTask {
    pub id: TaskId,
    pub name: String,
    pub user_id: String,
    pub incident_id: ZoneId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl DeliveryTask {
    pub fn new(name: impl Into<String>, user_id: impl Into<String>, incident_id: ZoneId) -> Self {
        DeliveryTask {
            id: TaskId::generate(),
            name: name.into(),
            user_id: user_id.into(),
            incident_id,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Builds the outbound payload, stamped at `sent_at`.
    pub fn payload(&self, sent_at: DateTime<Utc>) -> WebhookPayload {
        WebhookPayload {
            name: self.name.clone(),
            incident_id: self.incident_id,
            user_id: self.user_id.clone(),
            timestamp: sent_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// JSON body POSTed to the webhook target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub name: String,
    pub incident_id: ZoneId,
    pub user_id: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}
