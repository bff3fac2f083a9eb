//! PostgreSQL implementation of campaign repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool, types::Json};
use std::sync::Arc;

use crate::domain::entities::{Campaign, CampaignPatch, CampaignStatus, NewCampaign, TargetingSpec};
use crate::domain::repositories::CampaignRepository;
use crate::error::AppError;

const CAMPAIGN_COLUMNS: &str = "id, name, subject, html_content, text_content, targeting, status, \
     paused, total_recipients, success_count, failed_count, created_by, created_at, updated_at, sent_at";

#[derive(FromRow)]
struct CampaignRow {
    id: i64,
    name: String,
    subject: String,
    html_content: String,
    text_content: Option<String>,
    targeting: Json<TargetingSpec>,
    status: String,
    paused: bool,
    total_recipients: i64,
    success_count: i64,
    failed_count: i64,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = AppError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<CampaignStatus>().map_err(|e| {
            AppError::internal("Corrupt campaign row", json!({ "id": row.id, "reason": e }))
        })?;

        Ok(Campaign {
            id: row.id,
            name: row.name,
            subject: row.subject,
            html_content: row.html_content,
            text_content: row.text_content,
            targeting: row.targeting.0,
            status,
            paused: row.paused,
            total_recipients: row.total_recipients,
            success_count: row.success_count,
            failed_count: row.failed_count,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sent_at: row.sent_at,
        })
    }
}

fn into_campaign(row: Option<CampaignRow>) -> Result<Option<Campaign>, AppError> {
    row.map(Campaign::try_from).transpose()
}

/// PostgreSQL repository for campaigns.
///
/// Every lifecycle transition is a single conditional `UPDATE ... RETURNING`,
/// so the state check and the write cannot be interleaved by another caller.
pub struct PgCampaignRepository {
    pool: Arc<PgPool>,
}

impl PgCampaignRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn create(&self, new_campaign: NewCampaign) -> Result<Campaign, AppError> {
        let sql = format!(
            r#"
            INSERT INTO campaigns (name, subject, html_content, text_content, targeting, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(&new_campaign.name)
            .bind(&new_campaign.subject)
            .bind(&new_campaign.html_content)
            .bind(&new_campaign.text_content)
            .bind(Json(&new_campaign.targeting))
            .bind(&new_campaign.created_by)
            .fetch_one(self.pool.as_ref())
            .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1");

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        into_campaign(row)
    }

    async fn list(
        &self,
        status: Option<CampaignStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Campaign>, AppError> {
        let sql = format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let rows = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn count(&self, status: Option<CampaignStatus>) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM campaigns WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn update_draft(
        &self,
        id: i64,
        patch: CampaignPatch,
    ) -> Result<Option<Campaign>, AppError> {
        // $5 distinguishes "leave text_content alone" from "set it to NULL".
        let sql = format!(
            r#"
            UPDATE campaigns
            SET name         = COALESCE($2, name),
                subject      = COALESCE($3, subject),
                html_content = COALESCE($4, html_content),
                text_content = CASE WHEN $5 THEN $6 ELSE text_content END,
                targeting    = COALESCE($7, targeting),
                updated_at   = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );

        let (set_text, text) = match patch.text_content {
            Some(text) => (true, text),
            None => (false, None),
        };

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(patch.subject)
            .bind(patch.html_content)
            .bind(set_text)
            .bind(text)
            .bind(patch.targeting.map(Json))
            .fetch_optional(self.pool.as_ref())
            .await?;

        into_campaign(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1 AND status <> 'sending'")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_sending(
        &self,
        id: i64,
        total_recipients: i64,
    ) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            r#"
            UPDATE campaigns
            SET status = 'sending',
                paused = FALSE,
                total_recipients = $2,
                success_count = 0,
                failed_count = 0,
                updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .bind(total_recipients)
            .fetch_optional(self.pool.as_ref())
            .await?;

        into_campaign(row)
    }

    async fn set_paused(&self, id: i64, paused: bool) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            r#"
            UPDATE campaigns
            SET paused = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .bind(paused)
            .fetch_optional(self.pool.as_ref())
            .await?;

        into_campaign(row)
    }

    async fn mark_sent(
        &self,
        id: i64,
        success_count: i64,
        failed_count: i64,
    ) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            r#"
            UPDATE campaigns
            SET status = 'sent',
                paused = FALSE,
                success_count = $2,
                failed_count = $3,
                sent_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .bind(success_count)
            .bind(failed_count)
            .fetch_optional(self.pool.as_ref())
            .await?;

        into_campaign(row)
    }

    async fn find_resumable(&self) -> Result<Vec<Campaign>, AppError> {
        let sql = format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE status = 'sending' AND NOT paused
            ORDER BY id
            "#
        );

        let rows = sqlx::query_as::<_, CampaignRow>(&sql)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
