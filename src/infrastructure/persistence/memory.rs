//! In-memory implementation of every repository trait.
//!
//! All state lives in one [`tokio::sync::RwLock`]-guarded struct so that
//! multi-table effects (cascading campaign deletes) are atomic. Nothing is
//! durable; the store exists so service, dispatch and HTTP tests run without
//! a database. Semantics mirror the PostgreSQL repositories: conditional
//! lifecycle transitions, id-ordered cursors and pending-only row settlement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::audience::AudienceQuery;
use crate::domain::entities::{
    Campaign, CampaignPatch, CampaignStatus, DeliveryCounts, DeliveryLog, DeliveryStatus,
    NewCampaign, NewDeliveryLog, NewRecipient, Recipient,
};
use crate::domain::repositories::{
    ApiToken, CampaignRepository, DeliveryLogRepository, RecipientRepository, TokenRepository,
};
use crate::error::AppError;

#[derive(Default)]
struct Tables {
    campaign_seq: i64,
    campaigns: BTreeMap<i64, Campaign>,
    recipient_seq: i64,
    recipients: BTreeMap<i64, Recipient>,
    log_seq: i64,
    logs: BTreeMap<i64, DeliveryLog>,
    token_seq: i64,
    tokens: BTreeMap<i64, ApiToken>,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

/// Non-durable store backing all repositories.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an account.
    pub async fn insert_recipient(&self, new_recipient: NewRecipient) -> Recipient {
        let mut tables = self.tables.write().await;
        let id = next(&mut tables.recipient_seq);
        let recipient = Recipient {
            id,
            email: new_recipient.email,
            opted_in: new_recipient.opted_in,
            active: new_recipient.active,
            membership_tier: new_recipient.membership_tier,
            total_spent_cents: new_recipient.total_spent_cents,
            unsubscribe_token: None,
        };
        tables.recipients.insert(id, recipient.clone());
        recipient
    }

    /// Snapshot of one account.
    pub async fn recipient(&self, id: i64) -> Option<Recipient> {
        self.tables.read().await.recipients.get(&id).cloned()
    }

    /// Snapshot of one campaign.
    pub async fn campaign(&self, id: i64) -> Option<Campaign> {
        self.tables.read().await.campaigns.get(&id).cloned()
    }

    /// Every delivery row of a campaign in id order.
    pub async fn deliveries(&self, campaign_id: i64) -> Vec<DeliveryLog> {
        self.tables
            .read()
            .await
            .logs
            .values()
            .filter(|log| log.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    /// Total delivery rows across all campaigns.
    pub async fn delivery_row_count(&self) -> usize {
        self.tables.read().await.logs.len()
    }
}

fn campaign_not_found(id: i64) -> AppError {
    AppError::campaign_not_found(id)
}

fn recipient_not_found(id: i64) -> AppError {
    AppError::not_found("Recipient not found", json!({ "id": id }))
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn create(&self, new_campaign: NewCampaign) -> Result<Campaign, AppError> {
        let mut tables = self.tables.write().await;
        let id = next(&mut tables.campaign_seq);
        let now = Utc::now();
        let campaign = Campaign {
            id,
            name: new_campaign.name,
            subject: new_campaign.subject,
            html_content: new_campaign.html_content,
            text_content: new_campaign.text_content,
            targeting: new_campaign.targeting,
            status: CampaignStatus::Draft,
            paused: false,
            total_recipients: 0,
            success_count: 0,
            failed_count: 0,
            created_by: new_campaign.created_by,
            created_at: now,
            updated_at: now,
            sent_at: None,
        };
        tables.campaigns.insert(id, campaign.clone());
        Ok(campaign)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError> {
        Ok(self.campaign(id).await)
    }

    async fn list(
        &self,
        status: Option<CampaignStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Campaign>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .campaigns
            .values()
            .rev()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn count(&self, status: Option<CampaignStatus>) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .campaigns
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .count() as i64)
    }

    async fn update_draft(
        &self,
        id: i64,
        patch: CampaignPatch,
    ) -> Result<Option<Campaign>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.campaigns.get_mut(&id) {
            Some(campaign) if campaign.is_draft() => {
                patch.apply_to(campaign);
                campaign.updated_at = Utc::now();
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.campaigns.get(&id) {
            Some(campaign) if !campaign.is_sending() => {
                tables.campaigns.remove(&id);
                tables.logs.retain(|_, log| log.campaign_id != id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_sending(
        &self,
        id: i64,
        total_recipients: i64,
    ) -> Result<Option<Campaign>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.campaigns.get_mut(&id) {
            Some(campaign) if campaign.is_draft() => {
                campaign.status = CampaignStatus::Sending;
                campaign.paused = false;
                campaign.total_recipients = total_recipients;
                campaign.success_count = 0;
                campaign.failed_count = 0;
                campaign.updated_at = Utc::now();
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_paused(&self, id: i64, paused: bool) -> Result<Option<Campaign>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.campaigns.get_mut(&id) {
            Some(campaign) if campaign.is_sending() => {
                campaign.paused = paused;
                campaign.updated_at = Utc::now();
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_sent(
        &self,
        id: i64,
        success_count: i64,
        failed_count: i64,
    ) -> Result<Option<Campaign>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.campaigns.get_mut(&id) {
            Some(campaign) if campaign.is_sending() => {
                let now = Utc::now();
                campaign.status = CampaignStatus::Sent;
                campaign.paused = false;
                campaign.success_count = success_count;
                campaign.failed_count = failed_count;
                campaign.sent_at = Some(now);
                campaign.updated_at = now;
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_resumable(&self) -> Result<Vec<Campaign>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .campaigns
            .values()
            .filter(|c| c.is_sending() && !c.paused)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl RecipientRepository for MemoryStore {
    async fn find_audience(&self, query: AudienceQuery) -> Result<Vec<Recipient>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipients
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn count_audience(&self, query: AudienceQuery) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.recipients.values().filter(|r| query.matches(r)).count() as i64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Recipient>, AppError> {
        Ok(self.recipient(id).await)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Recipient>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipients
            .values()
            .find(|r| r.unsubscribe_token.as_deref() == Some(token))
            .cloned())
    }

    async fn assign_unsubscribe_token(&self, id: i64, token: &str) -> Result<String, AppError> {
        let mut tables = self.tables.write().await;

        let taken = tables
            .recipients
            .values()
            .any(|r| r.id != id && r.unsubscribe_token.as_deref() == Some(token));

        let recipient = tables
            .recipients
            .get_mut(&id)
            .ok_or_else(|| recipient_not_found(id))?;

        if let Some(existing) = &recipient.unsubscribe_token {
            return Ok(existing.clone());
        }
        if taken {
            return Err(AppError::conflict(
                "Unsubscribe token already in use",
                json!({ "recipient_id": id }),
            ));
        }

        recipient.unsubscribe_token = Some(token.to_string());
        Ok(token.to_string())
    }

    async fn opt_out(&self, id: i64) -> Result<Recipient, AppError> {
        let mut tables = self.tables.write().await;
        let recipient = tables
            .recipients
            .get_mut(&id)
            .ok_or_else(|| recipient_not_found(id))?;
        recipient.opted_in = false;
        Ok(recipient.clone())
    }
}

#[async_trait]
impl DeliveryLogRepository for MemoryStore {
    async fn insert_pending(
        &self,
        campaign_id: i64,
        rows: Vec<NewDeliveryLog>,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;

        if !tables.campaigns.contains_key(&campaign_id) {
            return Err(campaign_not_found(campaign_id));
        }
        let duplicate = rows.iter().enumerate().any(|(i, row)| {
            rows[..i].iter().any(|r| r.recipient_id == row.recipient_id)
                || tables
                    .logs
                    .values()
                    .any(|l| l.campaign_id == campaign_id && l.recipient_id == row.recipient_id)
        });
        if duplicate {
            return Err(AppError::conflict(
                "Recipient already has a delivery row for this campaign",
                json!({ "campaign_id": campaign_id }),
            ));
        }

        let now = Utc::now();
        let inserted = rows.len() as u64;
        for row in rows {
            let id = next(&mut tables.log_seq);
            tables.logs.insert(
                id,
                DeliveryLog {
                    id,
                    campaign_id,
                    recipient_id: row.recipient_id,
                    email: row.email,
                    unsubscribe_token: row.unsubscribe_token,
                    status: DeliveryStatus::Pending,
                    sent_at: None,
                    error_message: None,
                    created_at: now,
                },
            );
        }

        Ok(inserted)
    }

    async fn next_pending(
        &self,
        campaign_id: i64,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLog>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .logs
            .range(after_id.saturating_add(1)..)
            .map(|(_, log)| log)
            .filter(|log| log.campaign_id == campaign_id && log.status == DeliveryStatus::Pending)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.logs.get_mut(&id) {
            Some(log) if log.status == DeliveryStatus::Pending => {
                log.status = DeliveryStatus::Sent;
                log.sent_at = Some(sent_at);
                log.error_message = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: i64, error_message: String) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.logs.get_mut(&id) {
            Some(log) if log.status == DeliveryStatus::Pending => {
                log.status = DeliveryStatus::Failed;
                log.error_message = Some(error_message);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_by_status(&self, campaign_id: i64) -> Result<DeliveryCounts, AppError> {
        let tables = self.tables.read().await;
        let mut counts = DeliveryCounts::default();
        tables
            .logs
            .values()
            .filter(|log| log.campaign_id == campaign_id)
            .for_each(|log| counts.record(log.status));
        Ok(counts)
    }

    async fn list(
        &self,
        campaign_id: i64,
        status: Option<DeliveryStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLog>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .logs
            .values()
            .filter(|log| log.campaign_id == campaign_id)
            .filter(|log| status.is_none_or(|s| log.status == s))
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn count(
        &self,
        campaign_id: i64,
        status: Option<DeliveryStatus>,
    ) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .logs
            .values()
            .filter(|log| log.campaign_id == campaign_id)
            .filter(|log| status.is_none_or(|s| log.status == s))
            .count() as i64)
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn find_active(&self, token_hash: &str) -> Result<Option<ApiToken>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .values()
            .find(|t| t.token_hash == token_hash && !t.is_revoked())
            .cloned())
    }

    async fn touch_last_used(&self, id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if let Some(token) = tables.tokens.get_mut(&id) {
            token.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn create(&self, name: &str, token_hash: &str) -> Result<ApiToken, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .tokens
            .values()
            .any(|t| t.name == name || t.token_hash == token_hash)
        {
            return Err(AppError::conflict(
                "Token already exists",
                json!({ "name": name }),
            ));
        }

        let id = next(&mut tables.token_seq);
        let token = ApiToken {
            id,
            name: name.to_string(),
            token_hash: token_hash.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        tables.tokens.insert(id, token.clone());
        Ok(token)
    }

    async fn list(&self) -> Result<Vec<ApiToken>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.values().rev().cloned().collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ApiToken>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.values().find(|t| t.name == name).cloned())
    }

    async fn revoke(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.tokens.get_mut(&id) {
            Some(token) if !token.is_revoked() => {
                token.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TargetingSpec;

    fn draft() -> NewCampaign {
        NewCampaign {
            name: "Launch".to_string(),
            subject: "Hello".to_string(),
            html_content: "<p>Hi</p>".to_string(),
            text_content: None,
            targeting: TargetingSpec::AllOptedIn,
            created_by: None,
        }
    }

    fn pending(recipient_id: i64) -> NewDeliveryLog {
        NewDeliveryLog {
            recipient_id,
            email: format!("r{recipient_id}@example.com"),
            unsubscribe_token: format!("tok-{recipient_id}"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_are_conditional() {
        let store = MemoryStore::new();
        let campaign = CampaignRepository::create(&store, draft()).await.unwrap();

        assert!(store.set_paused(campaign.id, true).await.unwrap().is_none());
        assert!(CampaignRepository::mark_sent(&store, campaign.id, 0, 0)
            .await
            .unwrap()
            .is_none());

        let sending = store.mark_sending(campaign.id, 2).await.unwrap().unwrap();
        assert_eq!(sending.status, CampaignStatus::Sending);
        assert!(store.mark_sending(campaign.id, 2).await.unwrap().is_none());
        assert!(store
            .update_draft(campaign.id, CampaignPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(!CampaignRepository::delete(&store, campaign.id).await.unwrap());

        let sent = CampaignRepository::mark_sent(&store, campaign.id, 1, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.status, CampaignStatus::Sent);
        assert!(sent.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_cursor_and_settlement() {
        let store = MemoryStore::new();
        let campaign = CampaignRepository::create(&store, draft()).await.unwrap();
        store
            .insert_pending(campaign.id, vec![pending(1), pending(2), pending(3)])
            .await
            .unwrap();

        let first = store.next_pending(campaign.id, 0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first[0].id < first[1].id);

        assert!(DeliveryLogRepository::mark_sent(&store, first[0].id, Utc::now())
            .await
            .unwrap());
        assert!(!store
            .mark_failed(first[0].id, "late".to_string())
            .await
            .unwrap());

        let rest = store.next_pending(campaign.id, first[1].id, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].recipient_id, 3);

        let counts = store.count_by_status(campaign.id).await.unwrap();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.pending, 2);
    }

    #[tokio::test]
    async fn test_duplicate_rows_are_rejected() {
        let store = MemoryStore::new();
        let campaign = CampaignRepository::create(&store, draft()).await.unwrap();

        let result = store
            .insert_pending(campaign.id, vec![pending(1), pending(1)])
            .await;

        assert!(matches!(result, Err(AppError::Conflict { .. })));
        assert_eq!(store.delivery_row_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_rows() {
        let store = MemoryStore::new();
        let campaign = CampaignRepository::create(&store, draft()).await.unwrap();
        store
            .insert_pending(campaign.id, vec![pending(1)])
            .await
            .unwrap();

        assert!(CampaignRepository::delete(&store, campaign.id).await.unwrap());
        assert_eq!(store.delivery_row_count().await, 0);
    }

    #[tokio::test]
    async fn test_token_assignment_keeps_first_token() {
        let store = MemoryStore::new();
        let a = store
            .insert_recipient(NewRecipient::opted_in("a@example.com"))
            .await;
        let b = store
            .insert_recipient(NewRecipient::opted_in("b@example.com"))
            .await;

        assert_eq!(store.assign_unsubscribe_token(a.id, "t1").await.unwrap(), "t1");
        assert_eq!(store.assign_unsubscribe_token(a.id, "t2").await.unwrap(), "t1");
        assert!(matches!(
            store.assign_unsubscribe_token(b.id, "t1").await,
            Err(AppError::Conflict { .. })
        ));
    }
}
