//! DTOs for campaign authoring and lifecycle endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use validator::Validate;

use crate::domain::entities::{
    Campaign, CampaignOutcome, CampaignPatch, CampaignStatus, NewCampaign, TargetingSpec,
};

/// Request body for `POST /api/campaigns`.
///
/// A missing `targeting` means every opted-in recipient.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 998))]
    pub subject: String,

    #[validate(length(min = 1))]
    pub html_content: String,

    pub text_content: Option<String>,

    pub targeting: Option<TargetingSpec>,
}

impl CreateCampaignRequest {
    /// Converts the request into domain input, stamping the author.
    pub fn into_new_campaign(self, created_by: Option<String>) -> NewCampaign {
        NewCampaign {
            name: self.name,
            subject: self.subject,
            html_content: self.html_content,
            text_content: self.text_content,
            targeting: self.targeting.unwrap_or_default(),
            created_by,
        }
    }
}

/// Request body for `PATCH /api/campaigns/{id}`.
///
/// Only provided fields change. `text_content: null` clears the plain-text
/// fallback, an absent `text_content` leaves it alone.
#[serde_as]
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 998))]
    pub subject: Option<String>,

    #[validate(length(min = 1))]
    pub html_content: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub text_content: Option<Option<String>>,

    pub targeting: Option<TargetingSpec>,
}

impl From<UpdateCampaignRequest> for CampaignPatch {
    fn from(req: UpdateCampaignRequest) -> Self {
        CampaignPatch {
            name: req.name,
            subject: req.subject,
            html_content: req.html_content,
            text_content: req.text_content,
            targeting: req.targeting,
        }
    }
}

/// Request body for `POST /api/campaigns/{id}/test`.
#[derive(Debug, Deserialize)]
pub struct SendTestRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct SendTestResponse {
    pub sent: bool,
}

/// Campaign as returned by every campaign endpoint.
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub targeting: TargetingSpec,
    pub status: CampaignStatus,
    pub paused: bool,
    pub total_recipients: i64,
    pub success_count: i64,
    pub failed_count: i64,
    /// Present once the campaign is `sent`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CampaignOutcome>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        let outcome = c.outcome();
        CampaignResponse {
            id: c.id,
            name: c.name,
            subject: c.subject,
            html_content: c.html_content,
            text_content: c.text_content,
            targeting: c.targeting,
            status: c.status,
            paused: c.paused,
            total_recipients: c.total_recipients,
            success_count: c.success_count,
            failed_count: c.failed_count,
            outcome,
            created_by: c.created_by,
            created_at: c.created_at,
            updated_at: c.updated_at,
            sent_at: c.sent_at,
        }
    }
}
