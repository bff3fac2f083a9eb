//! Campaign aggregate: one bulk-messaging job and its lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::targeting::TargetingSpec;

/// Lifecycle state of a campaign.
///
/// Transitions are monotonic: `Draft -> Sending -> Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Sent,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sending => "sending",
            Self::Sent => "sent",
        }
    }

    /// Returns true if `next` is the single legal successor of `self`.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sending) | (Self::Sending, Self::Sent)
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            other => Err(format!("unknown campaign status '{other}'")),
        }
    }
}

/// Delivery result of a finished campaign.
///
/// `Sent` only means the batch finished processing; this is what the
/// recipients actually experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignOutcome {
    /// The audience was empty.
    Empty,
    /// Every attempt succeeded.
    Delivered,
    /// Some attempts failed.
    Partial,
    /// No attempt succeeded.
    Failed,
}

/// A marketing campaign.
///
/// Content fields (`name`, `subject`, `html_content`, `text_content`,
/// `targeting`) are mutable only while `status` is [`CampaignStatus::Draft`].
/// Counters and `status` are written by the dispatch coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub targeting: TargetingSpec,
    pub status: CampaignStatus,
    /// Set by an operator to halt the send loop between iterations.
    pub paused: bool,
    pub total_recipients: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn is_draft(&self) -> bool {
        self.status == CampaignStatus::Draft
    }

    pub fn is_sending(&self) -> bool {
        self.status == CampaignStatus::Sending
    }

    /// Delivery outcome, available once the campaign reached `sent`.
    pub fn outcome(&self) -> Option<CampaignOutcome> {
        if self.status != CampaignStatus::Sent {
            return None;
        }

        Some(match (self.success_count, self.failed_count) {
            (0, 0) => CampaignOutcome::Empty,
            (_, 0) => CampaignOutcome::Delivered,
            (0, _) => CampaignOutcome::Failed,
            _ => CampaignOutcome::Partial,
        })
    }
}

/// Input data for creating a new campaign. Campaigns always start as drafts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCampaign {
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub targeting: TargetingSpec,
    pub created_by: Option<String>,
}

/// Partial update for a draft campaign.
///
/// `None` fields are left unchanged.
/// `text_content: Some(None)` clears the plain-text fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_content: Option<String>,
    pub text_content: Option<Option<String>>,
    pub targeting: Option<TargetingSpec>,
}

impl CampaignPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.subject.is_none()
            && self.html_content.is_none()
            && self.text_content.is_none()
            && self.targeting.is_none()
    }

    /// Applies the patch to an in-memory campaign.
    pub fn apply_to(self, campaign: &mut Campaign) {
        if let Some(name) = self.name {
            campaign.name = name;
        }
        if let Some(subject) = self.subject {
            campaign.subject = subject;
        }
        if let Some(html) = self.html_content {
            campaign.html_content = html;
        }
        if let Some(text) = self.text_content {
            campaign.text_content = text;
        }
        if let Some(targeting) = self.targeting {
            campaign.targeting = targeting;
        }
    }
}
