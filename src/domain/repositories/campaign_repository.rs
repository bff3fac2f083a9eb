//! Repository trait for campaign storage and lifecycle transitions.

use crate::domain::entities::{Campaign, CampaignPatch, CampaignStatus, NewCampaign};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for campaigns.
///
/// Lifecycle transitions are conditional writes: each one only applies when
/// the stored state allows it and reports `None`/`false` otherwise, so two
/// concurrent callers can never both win the same transition.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgCampaignRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - in-memory implementation for tests
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Inserts a new campaign in the `draft` state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, new_campaign: NewCampaign) -> Result<Campaign, AppError>;

    /// Finds a campaign by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError>;

    /// Lists campaigns newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list(
        &self,
        status: Option<CampaignStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Campaign>, AppError>;

    /// Counts campaigns, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count(&self, status: Option<CampaignStatus>) -> Result<i64, AppError>;

    /// Applies a patch if the campaign is still a draft.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Campaign))` with the updated campaign
    /// - `Ok(None)` if the campaign is missing or no longer a draft
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn update_draft(
        &self,
        id: i64,
        patch: CampaignPatch,
    ) -> Result<Option<Campaign>, AppError>;

    /// Deletes a campaign and, transitively, its delivery rows.
    ///
    /// Campaigns in the `sending` state are never deleted.
    /// Returns `Ok(true)` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// Flips `draft -> sending` and records the audience size.
    ///
    /// Returns `Ok(None)` if the campaign is missing or not a draft.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_sending(&self, id: i64, total_recipients: i64)
    -> Result<Option<Campaign>, AppError>;

    /// Sets the pause flag of a sending campaign.
    ///
    /// Returns `Ok(None)` if the campaign is missing or not sending.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn set_paused(&self, id: i64, paused: bool) -> Result<Option<Campaign>, AppError>;

    /// Flips `sending -> sent` and writes the final counters and `sent_at`
    /// in one update.
    ///
    /// Returns `Ok(None)` if the campaign is missing or not sending.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_sent(
        &self,
        id: i64,
        success_count: i64,
        failed_count: i64,
    ) -> Result<Option<Campaign>, AppError>;

    /// Lists campaigns left in `sending` without the pause flag, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_resumable(&self) -> Result<Vec<Campaign>, AppError>;

    /// Lightweight connectivity probe.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the store is unreachable.
    async fn ping(&self) -> Result<(), AppError>;
}
