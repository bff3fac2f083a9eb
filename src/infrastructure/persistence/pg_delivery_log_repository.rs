//! PostgreSQL implementation of delivery log repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{DeliveryCounts, DeliveryLog, DeliveryStatus, NewDeliveryLog};
use crate::domain::repositories::DeliveryLogRepository;
use crate::error::AppError;

const LOG_COLUMNS: &str = "id, campaign_id, recipient_id, email, unsubscribe_token, status, \
     sent_at, error_message, created_at";

#[derive(FromRow)]
struct DeliveryLogRow {
    id: i64,
    campaign_id: i64,
    recipient_id: i64,
    email: String,
    unsubscribe_token: String,
    status: String,
    sent_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeliveryLogRow> for DeliveryLog {
    type Error = AppError;

    fn try_from(row: DeliveryLogRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<DeliveryStatus>().map_err(|e| {
            AppError::internal("Corrupt delivery row", json!({ "id": row.id, "reason": e }))
        })?;

        Ok(DeliveryLog {
            id: row.id,
            campaign_id: row.campaign_id,
            recipient_id: row.recipient_id,
            email: row.email,
            unsubscribe_token: row.unsubscribe_token,
            status,
            sent_at: row.sent_at,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL repository for delivery logs.
pub struct PgDeliveryLogRepository {
    pool: Arc<PgPool>,
}

impl PgDeliveryLogRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLogRepository for PgDeliveryLogRepository {
    async fn insert_pending(
        &self,
        campaign_id: i64,
        rows: Vec<NewDeliveryLog>,
    ) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut recipient_ids = Vec::with_capacity(rows.len());
        let mut emails = Vec::with_capacity(rows.len());
        let mut tokens = Vec::with_capacity(rows.len());
        for row in rows {
            recipient_ids.push(row.recipient_id);
            emails.push(row.email);
            tokens.push(row.unsubscribe_token);
        }

        // Single statement: ids are assigned in input order.
        let result = sqlx::query(
            r#"
            INSERT INTO campaign_delivery_logs (campaign_id, recipient_id, email, unsubscribe_token)
            SELECT $1, r.recipient_id, r.email, r.token
            FROM UNNEST($2::bigint[], $3::text[], $4::text[])
                 WITH ORDINALITY AS r(recipient_id, email, token, ord)
            ORDER BY r.ord
            "#,
        )
        .bind(campaign_id)
        .bind(recipient_ids)
        .bind(emails)
        .bind(tokens)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn next_pending(
        &self,
        campaign_id: i64,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLog>, AppError> {
        let sql = format!(
            r#"
            SELECT {LOG_COLUMNS}
            FROM campaign_delivery_logs
            WHERE campaign_id = $1 AND status = 'pending' AND id > $2
            ORDER BY id
            LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, DeliveryLogRow>(&sql)
            .bind(campaign_id)
            .bind(after_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(DeliveryLog::try_from).collect()
    }

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_delivery_logs
            SET status = 'sent', sent_at = $2, error_message = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: i64, error_message: String) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_delivery_logs
            SET status = 'failed', error_message = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, campaign_id: i64) -> Result<DeliveryCounts, AppError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM campaign_delivery_logs
            WHERE campaign_id = $1
            GROUP BY status
            "#,
        )
        .bind(campaign_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut counts = DeliveryCounts::default();
        for (status, count) in rows {
            match status.parse::<DeliveryStatus>() {
                Ok(DeliveryStatus::Pending) => counts.pending = count,
                Ok(DeliveryStatus::Sent) => counts.sent = count,
                Ok(DeliveryStatus::Failed) => counts.failed = count,
                Err(reason) => {
                    return Err(AppError::internal(
                        "Corrupt delivery row",
                        json!({ "campaign_id": campaign_id, "reason": reason }),
                    ));
                }
            }
        }

        Ok(counts)
    }

    async fn list(
        &self,
        campaign_id: i64,
        status: Option<DeliveryStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLog>, AppError> {
        let sql = format!(
            r#"
            SELECT {LOG_COLUMNS}
            FROM campaign_delivery_logs
            WHERE campaign_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = sqlx::query_as::<_, DeliveryLogRow>(&sql)
            .bind(campaign_id)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(DeliveryLog::try_from).collect()
    }

    async fn count(
        &self,
        campaign_id: i64,
        status: Option<DeliveryStatus>,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM campaign_delivery_logs
            WHERE campaign_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(campaign_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }
}
