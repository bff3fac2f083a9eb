//! DTOs for delivery log inspection.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{DeliveryLog, DeliveryStatus};

/// One delivery row. The unsubscribe token is not exposed.
#[derive(Debug, Serialize)]
pub struct DeliveryItem {
    pub id: i64,
    pub recipient_id: i64,
    pub email: String,
    pub status: DeliveryStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DeliveryLog> for DeliveryItem {
    fn from(log: DeliveryLog) -> Self {
        DeliveryItem {
            id: log.id,
            recipient_id: log.recipient_id,
            email: log.email,
            status: log.status,
            sent_at: log.sent_at,
            error_message: log.error_message,
            created_at: log.created_at,
        }
    }
}

/// Live row counts for `GET /api/campaigns/{id}/stats`.
#[derive(Debug, Serialize)]
pub struct DeliveryStatsResponse {
    pub campaign_id: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub total: i64,
}
