//! Campaign authoring, test sends and delivery inspection.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use validator::ValidateEmail;

use crate::domain::entities::{
    Campaign, CampaignPatch, CampaignStatus, DeliveryCounts, DeliveryLog, DeliveryStatus,
    NewCampaign, Page, PageRequest,
};
use crate::domain::message::render_test;
use crate::domain::repositories::{CampaignRepository, DeliveryLogRepository};
use crate::domain::transport::Transport;
use crate::error::AppError;

const MAX_NAME_LEN: usize = 200;
/// RFC 5322 line limit, the practical ceiling for a subject header.
const MAX_SUBJECT_LEN: usize = 998;

fn require_text(field: &'static str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(
            format!("{field} must not be empty"),
            json!({ "field": field }),
        ));
    }
    if value.chars().count() > max_len {
        return Err(AppError::bad_request(
            format!("{field} is too long"),
            json!({ "field": field, "max_length": max_len }),
        ));
    }
    Ok(())
}

/// Service for everything an operator does with a campaign besides dispatch.
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    deliveries: Arc<dyn DeliveryLogRepository>,
    transport: Arc<dyn Transport>,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        deliveries: Arc<dyn DeliveryLogRepository>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            campaigns,
            deliveries,
            transport,
        }
    }

    /// Creates a draft campaign.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if a required field is blank or too
    /// long, or the targeting spec is malformed.
    pub async fn create(&self, new_campaign: NewCampaign) -> Result<Campaign, AppError> {
        require_text("name", &new_campaign.name, MAX_NAME_LEN)?;
        require_text("subject", &new_campaign.subject, MAX_SUBJECT_LEN)?;
        require_text("html_content", &new_campaign.html_content, usize::MAX)?;
        new_campaign.targeting.validate()?;

        let campaign = self.campaigns.create(new_campaign).await?;
        info!(
            campaign_id = campaign.id,
            created_by = campaign.created_by.as_deref().unwrap_or("-"),
            "Campaign created"
        );
        Ok(campaign)
    }

    /// Fetches a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if it does not exist.
    pub async fn get(&self, id: i64) -> Result<Campaign, AppError> {
        self.campaigns
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::campaign_not_found(id))
    }

    /// Edits a draft campaign.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the campaign does not exist
    /// - [`AppError::StateConflict`] (`campaign_locked`) if it is not a draft
    /// - [`AppError::Validation`] for blank fields, an empty patch or a bad spec
    pub async fn update(&self, id: i64, patch: CampaignPatch) -> Result<Campaign, AppError> {
        let current = self.get(id).await?;
        if !current.is_draft() {
            return Err(AppError::campaign_locked(id, current.status));
        }

        if patch.is_empty() {
            return Err(AppError::bad_request(
                "No fields to update",
                json!({ "campaign_id": id }),
            ));
        }
        if let Some(name) = &patch.name {
            require_text("name", name, MAX_NAME_LEN)?;
        }
        if let Some(subject) = &patch.subject {
            require_text("subject", subject, MAX_SUBJECT_LEN)?;
        }
        if let Some(html) = &patch.html_content {
            require_text("html_content", html, usize::MAX)?;
        }
        if let Some(targeting) = &patch.targeting {
            targeting.validate()?;
        }

        match self.campaigns.update_draft(id, patch).await? {
            Some(updated) => {
                info!(campaign_id = id, "Campaign updated");
                Ok(updated)
            }
            // Dispatched or deleted between the read and the write.
            None => match self.campaigns.find_by_id(id).await? {
                Some(campaign) => Err(AppError::campaign_locked(id, campaign.status)),
                None => Err(AppError::campaign_not_found(id)),
            },
        }
    }

    /// Deletes a campaign and its delivery rows.
    ///
    /// Returns `true` when a row was removed.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the campaign does not exist
    /// - [`AppError::StateConflict`] (`campaign_locked`) while it is sending
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let campaign = self.get(id).await?;
        if campaign.is_sending() {
            return Err(AppError::campaign_locked(id, campaign.status));
        }

        let deleted = self.campaigns.delete(id).await?;
        if deleted {
            info!(campaign_id = id, status = %campaign.status, "Campaign deleted");
        }
        Ok(deleted)
    }

    /// Lists campaigns newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store errors.
    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
        page: PageRequest,
    ) -> Result<Page<Campaign>, AppError> {
        let items = self
            .campaigns
            .list(status, page.offset(), page.limit())
            .await?;
        let total = self.campaigns.count(status).await?;

        Ok(Page::new(items, total, page))
    }

    /// Sends one preview message to `address`.
    ///
    /// Bypasses audience resolution and delivery rows entirely and never
    /// changes campaign state.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a malformed address
    /// - [`AppError::NotFound`] if the campaign does not exist
    /// - [`AppError::Transport`] if the gateway refuses the message
    pub async fn send_test(&self, id: i64, address: &str) -> Result<bool, AppError> {
        let address = address.trim();
        if !address.validate_email() {
            return Err(AppError::invalid_address(address));
        }

        let campaign = self.get(id).await?;
        let message = render_test(&campaign, address).map_err(|e| {
            AppError::internal("Failed to render test message", json!({ "reason": e.to_string() }))
        })?;

        self.transport.send(message).await.map_err(|e| {
            warn!(campaign_id = id, error = %e, "Test send failed");
            AppError::transport(
                "Mail gateway rejected the test message",
                json!({ "campaign_id": id, "reason": e.to_string() }),
            )
        })?;

        info!(campaign_id = id, "Test message sent");
        Ok(true)
    }

    /// Lists a campaign's delivery rows in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the campaign does not exist.
    pub async fn list_deliveries(
        &self,
        id: i64,
        status: Option<DeliveryStatus>,
        page: PageRequest,
    ) -> Result<Page<DeliveryLog>, AppError> {
        self.get(id).await?;

        let items = self
            .deliveries
            .list(id, status, page.offset(), page.limit())
            .await?;
        let total = self.deliveries.count(id, status).await?;

        Ok(Page::new(items, total, page))
    }

    /// Live row counts by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the campaign does not exist.
    pub async fn delivery_stats(&self, id: i64) -> Result<DeliveryCounts, AppError> {
        self.get(id).await?;
        self.deliveries.count_by_status(id).await
    }

    /// Store connectivity probe for health checks.
    pub async fn ping(&self) -> bool {
        self.campaigns.ping().await.is_ok()
    }
}
