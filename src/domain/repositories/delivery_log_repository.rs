//! Repository trait for per-recipient delivery rows.

use crate::domain::entities::{DeliveryCounts, DeliveryLog, DeliveryStatus, NewDeliveryLog};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository interface for delivery logs.
///
/// Rows are created in bulk as `pending` and each is settled exactly once.
/// Settling writes are conditional on the row still being pending.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgDeliveryLogRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - in-memory implementation for tests
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    /// Inserts one pending row per entry, preserving input order in the ids.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if a recipient already has a row for the campaign.
    /// Returns [`AppError::Internal`] on database errors.
    async fn insert_pending(
        &self,
        campaign_id: i64,
        rows: Vec<NewDeliveryLog>,
    ) -> Result<u64, AppError>;

    /// Fetches the next pending rows with `id > after_id`, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn next_pending(
        &self,
        campaign_id: i64,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLog>, AppError>;

    /// Settles a pending row as sent.
    ///
    /// Returns `Ok(false)` if the row was not pending.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool, AppError>;

    /// Settles a pending row as failed with the transport error message.
    ///
    /// Returns `Ok(false)` if the row was not pending.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_failed(&self, id: i64, error_message: String) -> Result<bool, AppError>;

    /// Counts a campaign's rows grouped by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count_by_status(&self, campaign_id: i64) -> Result<DeliveryCounts, AppError>;

    /// Lists a campaign's rows in id order, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list(
        &self,
        campaign_id: i64,
        status: Option<DeliveryStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLog>, AppError>;

    /// Counts a campaign's rows, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count(&self, campaign_id: i64, status: Option<DeliveryStatus>)
    -> Result<i64, AppError>;
}
