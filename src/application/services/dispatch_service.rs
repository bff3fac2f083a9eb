//! Dispatch coordination: the campaign state machine around the send loop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::dispatch_worker::{DispatchSummary, DispatchWorker, LoopExit};
use crate::application::services::{AudienceService, UnsubscribeService};
use crate::domain::entities::{Campaign, CampaignStatus, NewDeliveryLog, Recipient};
use crate::domain::repositories::{CampaignRepository, DeliveryLogRepository};
use crate::error::AppError;

/// Campaign ids with a live send loop in this process.
#[derive(Default)]
struct RunningLoops(Mutex<HashSet<i64>>);

impl RunningLoops {
    /// Claims the campaign. Returns `None` if a loop already owns it.
    fn claim(self: &Arc<Self>, campaign_id: i64) -> Option<LoopGuard> {
        let mut running = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        running.insert(campaign_id).then(|| LoopGuard {
            loops: Arc::clone(self),
            campaign_id,
        })
    }

    fn contains(&self, campaign_id: i64) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&campaign_id)
    }
}

/// Releases the claim when the loop task ends, however it ends.
struct LoopGuard {
    loops: Arc<RunningLoops>,
    campaign_id: i64,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.loops
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.campaign_id);
    }
}

/// Result of a dispatch request.
pub struct Dispatched {
    /// The campaign right after the synchronous part: `sending`, or `sent`
    /// for an empty audience.
    pub campaign: Campaign,
    /// The detached send loop, if one was started.
    pub handle: Option<JoinHandle<Option<DispatchSummary>>>,
}

/// Orchestrates dispatch, pause, resume and crash recovery.
///
/// `dispatch` does its work synchronously up to the bulk insert, then detaches
/// the send loop on the Tokio runtime and returns. At most one loop per
/// campaign runs in this process; every row is therefore written by a single
/// owner.
pub struct DispatchService {
    campaigns: Arc<dyn CampaignRepository>,
    deliveries: Arc<dyn DeliveryLogRepository>,
    audience: Arc<AudienceService>,
    unsubscribe: Arc<UnsubscribeService>,
    worker: DispatchWorker,
    running: Arc<RunningLoops>,
}

impl DispatchService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        deliveries: Arc<dyn DeliveryLogRepository>,
        audience: Arc<AudienceService>,
        unsubscribe: Arc<UnsubscribeService>,
        worker: DispatchWorker,
    ) -> Self {
        Self {
            campaigns,
            deliveries,
            audience,
            unsubscribe,
            worker,
            running: Arc::new(RunningLoops::default()),
        }
    }

    /// Dispatches a draft campaign and returns without waiting for delivery.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the campaign does not exist
    /// - [`AppError::StateConflict`] (`already_dispatched`) if it is not a draft;
    ///   nothing is written in that case
    /// - any store error from token issuance or the bulk insert, which leaves
    ///   the campaign in `sending` with no delivery rows
    pub async fn dispatch(&self, campaign_id: i64) -> Result<Campaign, AppError> {
        Ok(self.dispatch_with_handle(campaign_id).await?.campaign)
    }

    /// Same as [`Self::dispatch`], also returning the loop's join handle.
    pub async fn dispatch_with_handle(&self, campaign_id: i64) -> Result<Dispatched, AppError> {
        let campaign = self
            .campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::campaign_not_found(campaign_id))?;

        if !campaign.is_draft() {
            return Err(AppError::already_dispatched(campaign_id, campaign.status));
        }

        let recipients = self.audience.resolve(&campaign.targeting).await?;

        let targets: Vec<(Recipient, String)> = recipients
            .into_iter()
            .filter_map(|r| {
                let email = r.contact_address()?.to_string();
                Some((r, email))
            })
            .collect();
        let total = targets.len() as i64;

        // The conditional update is the real precondition check; the read
        // above only avoids resolving an audience for nothing.
        let Some(sending) = self.campaigns.mark_sending(campaign_id, total).await? else {
            let status = self
                .campaigns
                .find_by_id(campaign_id)
                .await?
                .map_or(CampaignStatus::Sent, |c| c.status);
            return Err(AppError::already_dispatched(campaign_id, status));
        };

        info!(campaign_id, total, "Campaign dispatch started");
        metrics::counter!("campaigns_dispatched_total").increment(1);

        if targets.is_empty() {
            let sent = self
                .campaigns
                .mark_sent(campaign_id, 0, 0)
                .await?
                .ok_or_else(|| AppError::not_sending(campaign_id, sending.status))?;
            info!(campaign_id, "Empty audience, campaign finalized immediately");
            return Ok(Dispatched {
                campaign: sent,
                handle: None,
            });
        }

        let mut rows = Vec::with_capacity(targets.len());
        for (mut recipient, email) in targets {
            let token = match self.unsubscribe.ensure_token(&mut recipient).await {
                Ok(token) => token,
                Err(e) => {
                    error!(
                        campaign_id,
                        recipient_id = recipient.id,
                        error = %e,
                        "Token issuance failed; campaign left in sending"
                    );
                    return Err(e);
                }
            };
            rows.push(NewDeliveryLog {
                recipient_id: recipient.id,
                email,
                unsubscribe_token: token,
            });
        }

        if let Err(e) = self.deliveries.insert_pending(campaign_id, rows).await {
            error!(
                campaign_id,
                error = %e,
                "Bulk insert of delivery rows failed; campaign left in sending"
            );
            return Err(e);
        }

        let handle = self.launch(campaign_id);

        Ok(Dispatched {
            campaign: sending,
            handle,
        })
    }

    /// Sets the pause flag. The running loop stops before its next attempt.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] or [`AppError::StateConflict`]
    /// (`campaign_not_sending`).
    pub async fn pause(&self, campaign_id: i64) -> Result<Campaign, AppError> {
        match self.campaigns.set_paused(campaign_id, true).await? {
            Some(campaign) => {
                info!(campaign_id, "Campaign paused");
                Ok(campaign)
            }
            None => Err(self.not_sending(campaign_id).await),
        }
    }

    /// Clears the pause flag and relaunches the loop over the remaining
    /// pending rows, unless one is already running for this campaign.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] or [`AppError::StateConflict`]
    /// (`campaign_not_sending`).
    pub async fn resume(&self, campaign_id: i64) -> Result<Campaign, AppError> {
        Ok(self.resume_with_handle(campaign_id).await?.campaign)
    }

    /// Same as [`Self::resume`], also returning the loop's join handle.
    pub async fn resume_with_handle(&self, campaign_id: i64) -> Result<Dispatched, AppError> {
        let Some(campaign) = self.campaigns.set_paused(campaign_id, false).await? else {
            return Err(self.not_sending(campaign_id).await);
        };

        let handle = self.launch(campaign_id);
        info!(
            campaign_id,
            relaunched = handle.is_some(),
            "Campaign resumed"
        );

        Ok(Dispatched { campaign, handle })
    }

    /// Relaunches loops for every unpaused campaign left in `sending`.
    ///
    /// Returns the ids that got a loop.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store errors.
    pub async fn recover_interrupted(&self) -> Result<Vec<i64>, AppError> {
        let mut resumed = Vec::new();
        for campaign in self.campaigns.find_resumable().await? {
            if self.launch(campaign.id).is_some() {
                resumed.push(campaign.id);
            }
        }

        if !resumed.is_empty() {
            warn!(campaigns = ?resumed, "Resumed interrupted campaigns");
        }
        Ok(resumed)
    }

    /// True while a loop for the campaign is running in this process.
    pub fn is_running(&self, campaign_id: i64) -> bool {
        self.running.contains(campaign_id)
    }

    /// Spawns the detached loop unless one already owns the campaign.
    fn launch(&self, campaign_id: i64) -> Option<JoinHandle<Option<DispatchSummary>>> {
        let mut guard = self.running.claim(campaign_id)?;
        let worker = self.worker.clone();
        let campaigns = Arc::clone(&self.campaigns);
        let running = Arc::clone(&self.running);

        Some(tokio::spawn(async move {
            loop {
                let summary = match worker.run(campaign_id).await {
                    Ok(summary) => summary,
                    Err(e) => {
                        error!(
                            campaign_id,
                            error = %e,
                            "Send loop aborted; campaign stays sending until resumed"
                        );
                        return None;
                    }
                };
                if summary.exit != LoopExit::Paused {
                    return Some(summary);
                }

                // A resume that raced this exit could not claim the campaign;
                // after releasing, pick its work up here instead.
                drop(guard);
                match campaigns.find_by_id(campaign_id).await {
                    Ok(Some(campaign)) if campaign.is_sending() && !campaign.paused => {}
                    _ => return Some(summary),
                }
                match running.claim(campaign_id) {
                    Some(next) => guard = next,
                    None => return Some(summary),
                }
            }
        }))
    }

    async fn not_sending(&self, campaign_id: i64) -> AppError {
        match self.campaigns.find_by_id(campaign_id).await {
            Ok(Some(campaign)) => AppError::not_sending(campaign_id, campaign.status),
            Ok(None) => AppError::campaign_not_found(campaign_id),
            Err(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NewCampaign, NewRecipient, TargetingSpec};
    use crate::domain::repositories::{
        MockCampaignRepository, MockDeliveryLogRepository, RecipientRepository,
    };
    use crate::domain::transport::{MockTransport, SendReceipt, Transport};
    use crate::infrastructure::persistence::MemoryStore;
    use crate::infrastructure::throttle::SendThrottle;
    use serde_json::json;

    fn accepting_transport() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(SendReceipt::default()));
        transport
    }

    fn build(
        store: &Arc<MemoryStore>,
        deliveries: Arc<dyn DeliveryLogRepository>,
        transport: MockTransport,
    ) -> DispatchService {
        let recipients: Arc<dyn RecipientRepository> = store.clone();
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let worker = DispatchWorker::new(
            store.clone(),
            deliveries.clone(),
            transport,
            Arc::new(SendThrottle::disabled()),
            "https://shop.example.com".to_string(),
            100,
        );
        DispatchService::new(
            store.clone(),
            deliveries,
            Arc::new(AudienceService::new(recipients.clone())),
            Arc::new(UnsubscribeService::new(recipients)),
            worker,
        )
    }

    async fn draft(store: &MemoryStore) -> Campaign {
        CampaignRepository::create(
            store,
            NewCampaign {
                name: "Launch".to_string(),
                subject: "It's here".to_string(),
                html_content: "<p>New</p>".to_string(),
                text_content: None,
                targeting: TargetingSpec::AllOptedIn,
                created_by: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_returns_sending_and_issues_tokens() {
        let store = Arc::new(MemoryStore::new());
        let r = store
            .insert_recipient(NewRecipient::opted_in("a@example.com"))
            .await;
        let campaign = draft(&store).await;
        let service = build(&store, store.clone(), accepting_transport());

        let dispatched = service.dispatch_with_handle(campaign.id).await.unwrap();

        assert_eq!(dispatched.campaign.status, CampaignStatus::Sending);
        assert_eq!(dispatched.campaign.total_recipients, 1);
        let token = store.recipient(r.id).await.unwrap().unsubscribe_token.unwrap();
        assert_eq!(store.deliveries(campaign.id).await[0].unsubscribe_token, token);

        let summary = dispatched.handle.unwrap().await.unwrap().unwrap();
        assert_eq!(summary.sent, 1);
    }

    #[tokio::test]
    async fn test_second_dispatch_is_rejected_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_recipient(NewRecipient::opted_in("a@example.com"))
            .await;
        let campaign = draft(&store).await;
        let service = build(&store, store.clone(), accepting_transport());

        let first = service.dispatch_with_handle(campaign.id).await.unwrap();
        first.handle.unwrap().await.unwrap();
        let rows_before = store.delivery_row_count().await;
        let before = store.campaign(campaign.id).await.unwrap();

        let err = service.dispatch(campaign.id).await.unwrap_err();

        assert_eq!(err.code(), "already_dispatched");
        assert_eq!(store.delivery_row_count().await, rows_before);
        assert_eq!(store.campaign(campaign.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_lost_dispatch_race_issues_no_tokens() {
        let store = Arc::new(MemoryStore::new());
        let r = store
            .insert_recipient(NewRecipient::opted_in("a@example.com"))
            .await;
        let campaign = draft(&store).await;

        let mut campaigns = MockCampaignRepository::new();
        let snapshot = campaign.clone();
        campaigns
            .expect_find_by_id()
            .returning(move |_| Ok(Some(snapshot.clone())));
        campaigns
            .expect_mark_sending()
            .times(1)
            .returning(|_, _| Ok(None));

        let recipients: Arc<dyn RecipientRepository> = store.clone();
        let campaigns: Arc<dyn CampaignRepository> = Arc::new(campaigns);
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let worker = DispatchWorker::new(
            campaigns.clone(),
            store.clone(),
            Arc::new(transport),
            Arc::new(SendThrottle::disabled()),
            "https://shop.example.com".to_string(),
            100,
        );
        let service = DispatchService::new(
            campaigns,
            store.clone(),
            Arc::new(AudienceService::new(recipients.clone())),
            Arc::new(UnsubscribeService::new(recipients)),
            worker,
        );

        let err = service.dispatch(campaign.id).await.unwrap_err();

        assert_eq!(err.code(), "already_dispatched");
        assert!(store.recipient(r.id).await.unwrap().unsubscribe_token.is_none());
        assert_eq!(store.delivery_row_count().await, 0);
    }

    #[tokio::test]
    async fn test_bulk_insert_failure_leaves_campaign_sending() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_recipient(NewRecipient::opted_in("a@example.com"))
            .await;
        let campaign = draft(&store).await;

        let mut deliveries = MockDeliveryLogRepository::new();
        deliveries
            .expect_insert_pending()
            .times(1)
            .returning(|_, _| Err(AppError::internal("connection reset", json!({}))));

        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let service = build(&store, Arc::new(deliveries), transport);

        let err = service.dispatch(campaign.id).await.unwrap_err();

        assert!(matches!(err, AppError::Internal { .. }));
        let stuck = store.campaign(campaign.id).await.unwrap();
        assert_eq!(stuck.status, CampaignStatus::Sending);
        assert_eq!(store.delivery_row_count().await, 0);
        assert!(!service.is_running(campaign.id));
    }

    #[tokio::test]
    async fn test_pause_and_resume_require_sending() {
        let store = Arc::new(MemoryStore::new());
        let campaign = draft(&store).await;
        let service = build(&store, store.clone(), MockTransport::new());

        assert_eq!(
            service.pause(campaign.id).await.unwrap_err().code(),
            "campaign_not_sending"
        );
        assert_eq!(
            service.resume(campaign.id).await.unwrap_err().code(),
            "campaign_not_sending"
        );
        assert_eq!(service.pause(999).await.unwrap_err().code(), "not_found");
    }

    #[tokio::test]
    async fn test_recover_relaunches_unpaused_sending_campaigns() {
        let store = Arc::new(MemoryStore::new());
        let r = store
            .insert_recipient(NewRecipient::opted_in("a@example.com"))
            .await;
        let interrupted = draft(&store).await;
        store.mark_sending(interrupted.id, 1).await.unwrap();
        store
            .insert_pending(
                interrupted.id,
                vec![NewDeliveryLog {
                    recipient_id: r.id,
                    email: "a@example.com".to_string(),
                    unsubscribe_token: "tok".to_string(),
                }],
            )
            .await
            .unwrap();

        let paused = draft(&store).await;
        store.mark_sending(paused.id, 0).await.unwrap();
        store.set_paused(paused.id, true).await.unwrap();

        let service = build(&store, store.clone(), accepting_transport());
        let resumed = service.recover_interrupted().await.unwrap();

        assert_eq!(resumed, vec![interrupted.id]);
    }
}
