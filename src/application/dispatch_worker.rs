//! The throttled send loop for one campaign.
//!
//! The loop is a cursor over the campaign's `pending` delivery rows in id
//! order. Each row is attempted once and settled as `sent` or `failed`; a
//! transport error never stops the loop. The pause flag is re-read before
//! every attempt. When no pending rows remain the campaign is finalized with
//! counters computed from the persisted rows, so a loop resumed after a pause
//! or crash still writes exact totals.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use crate::domain::entities::{Campaign, DeliveryCounts, DeliveryLog, DeliveryStatus};
use crate::domain::message::{render_for_recipient, unsubscribe_url};
use crate::domain::repositories::{CampaignRepository, DeliveryLogRepository};
use crate::domain::transport::Transport;
use crate::error::AppError;
use crate::infrastructure::throttle::SendThrottle;

/// Attempts for a row status write before the loop gives up.
const ROW_WRITE_ATTEMPTS: usize = 3;

/// Why a loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Every row was settled and the campaign is `sent`.
    Completed,
    /// The pause flag was observed; remaining rows stay pending.
    Paused,
    /// The campaign disappeared or left `sending` under the loop.
    Abandoned,
}

/// Result of one loop run.
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    pub campaign_id: i64,
    /// Rows settled by this run.
    pub attempted: i64,
    /// Successful sends in this run.
    pub sent: i64,
    /// Failed sends in this run.
    pub failed: i64,
    pub exit: LoopExit,
    /// The campaign as last written, when the run finalized it.
    pub campaign: Option<Campaign>,
}

/// Runs send loops. Cheap to clone; every loop shares the same throttle.
#[derive(Clone)]
pub struct DispatchWorker {
    campaigns: Arc<dyn CampaignRepository>,
    deliveries: Arc<dyn DeliveryLogRepository>,
    transport: Arc<dyn Transport>,
    throttle: Arc<SendThrottle>,
    public_base_url: String,
    batch_size: i64,
}

impl DispatchWorker {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        deliveries: Arc<dyn DeliveryLogRepository>,
        transport: Arc<dyn Transport>,
        throttle: Arc<SendThrottle>,
        public_base_url: String,
        batch_size: i64,
    ) -> Self {
        Self {
            campaigns,
            deliveries,
            transport,
            throttle,
            public_base_url,
            batch_size: batch_size.max(1),
        }
    }

    /// Processes every pending row of `campaign_id`, then finalizes it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the store fails beyond the retry budget. The
    /// campaign stays `sending` and can be resumed; rows already settled are
    /// never attempted again.
    pub async fn run(&self, campaign_id: i64) -> Result<DispatchSummary, AppError> {
        let mut summary = DispatchSummary {
            campaign_id,
            attempted: 0,
            sent: 0,
            failed: 0,
            exit: LoopExit::Completed,
            campaign: None,
        };

        let mut cursor = 0_i64;
        'batches: loop {
            let batch = self
                .deliveries
                .next_pending(campaign_id, cursor, self.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            for row in batch {
                cursor = row.id;

                // The shared limiter can hold us for several intervals; read state after it.
                self.throttle.acquire().await;

                // Content is frozen while sending; re-reading also picks up the pause flag.
                let Some(campaign) = self.campaigns.find_by_id(campaign_id).await? else {
                    summary.exit = LoopExit::Abandoned;
                    break 'batches;
                };
                if !campaign.is_sending() {
                    summary.exit = LoopExit::Abandoned;
                    break 'batches;
                }
                if campaign.paused {
                    summary.exit = LoopExit::Paused;
                    break 'batches;
                }

                let status = self.attempt(&campaign, &row).await?;
                summary.attempted += 1;
                match status {
                    DeliveryStatus::Sent => summary.sent += 1,
                    DeliveryStatus::Failed => summary.failed += 1,
                    DeliveryStatus::Pending => {}
                }
            }
        }

        if summary.exit == LoopExit::Completed {
            summary.campaign = self.finalize(campaign_id, &mut summary.exit).await?;
        }

        info!(
            campaign_id,
            attempted = summary.attempted,
            sent = summary.sent,
            failed = summary.failed,
            exit = ?summary.exit,
            "Send loop finished"
        );

        Ok(summary)
    }

    /// Sends one row and settles it. Returns the status written.
    async fn attempt(
        &self,
        campaign: &Campaign,
        row: &DeliveryLog,
    ) -> Result<DeliveryStatus, AppError> {
        let link = unsubscribe_url(&self.public_base_url, &row.unsubscribe_token);

        let outcome = match render_for_recipient(campaign, &row.email, &link) {
            Ok(message) => self
                .transport
                .send(message)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(receipt) => {
                debug!(
                    campaign_id = campaign.id,
                    delivery_id = row.id,
                    response = ?receipt.response,
                    "Delivery sent"
                );
                metrics::counter!("campaign_deliveries_total", "status" => "sent").increment(1);
                self.settle(row.id, None).await?;
                Ok(DeliveryStatus::Sent)
            }
            Err(error) => {
                warn!(
                    campaign_id = campaign.id,
                    delivery_id = row.id,
                    error = %error,
                    "Delivery failed"
                );
                metrics::counter!("campaign_deliveries_total", "status" => "failed").increment(1);
                self.settle(row.id, Some(error)).await?;
                Ok(DeliveryStatus::Failed)
            }
        }
    }

    /// Writes the row status, retrying transient store errors with backoff.
    async fn settle(&self, delivery_id: i64, error: Option<String>) -> Result<(), AppError> {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(500))
            .map(jitter)
            .take(ROW_WRITE_ATTEMPTS - 1);

        let written = Retry::spawn(strategy, || {
            let error = error.clone();
            async move {
                match error {
                    None => self.deliveries.mark_sent(delivery_id, Utc::now()).await,
                    Some(message) => self.deliveries.mark_failed(delivery_id, message).await,
                }
            }
        })
        .await?;

        if !written {
            warn!(delivery_id, "Delivery row was already settled");
        }
        Ok(())
    }

    /// Flips the campaign to `sent` if no pending rows remain.
    async fn finalize(
        &self,
        campaign_id: i64,
        exit: &mut LoopExit,
    ) -> Result<Option<Campaign>, AppError> {
        let counts: DeliveryCounts = self.deliveries.count_by_status(campaign_id).await?;

        if !counts.is_settled() {
            warn!(
                campaign_id,
                pending = counts.pending,
                "Pending rows remain after the cursor finished; campaign left sending"
            );
            *exit = LoopExit::Abandoned;
            return Ok(None);
        }

        match self
            .campaigns
            .mark_sent(campaign_id, counts.sent, counts.failed)
            .await?
        {
            Some(campaign) => {
                metrics::counter!("campaigns_completed_total").increment(1);
                info!(
                    campaign_id,
                    total = counts.total(),
                    success = counts.sent,
                    failed = counts.failed,
                    "Campaign sent"
                );
                Ok(Some(campaign))
            }
            None => {
                let current = self.campaigns.find_by_id(campaign_id).await?;
                warn!(
                    campaign_id,
                    status = ?current.map(|c| c.status),
                    "Campaign was no longer sending at finalization"
                );
                *exit = LoopExit::Abandoned;
                Ok(None)
            }
        }
    }
}
