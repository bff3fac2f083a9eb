//! PostgreSQL implementation of recipient repository over the `accounts` table.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::audience::AudienceQuery;
use crate::domain::entities::{MembershipTier, Recipient};
use crate::domain::repositories::RecipientRepository;
use crate::error::AppError;

const RECIPIENT_COLUMNS: &str =
    "id, email, marketing_opt_in, is_active, membership_tier, total_spent_cents, unsubscribe_token";

/// Base filter plus the targeting predicates. `$1` relaxes opt-in for previews.
const AUDIENCE_PREDICATE: &str = r#"
    is_active
    AND email IS NOT NULL
    AND btrim(email) <> ''
    AND (NOT $1::boolean OR marketing_opt_in)
    AND ($2::text[] IS NULL OR membership_tier = ANY($2))
    AND ($3::bigint IS NULL OR total_spent_cents >= $3)
    AND ($4::bigint IS NULL OR total_spent_cents <= $4)
"#;

#[derive(FromRow)]
struct RecipientRow {
    id: i64,
    email: Option<String>,
    marketing_opt_in: bool,
    is_active: bool,
    membership_tier: Option<String>,
    total_spent_cents: i64,
    unsubscribe_token: Option<String>,
}

impl TryFrom<RecipientRow> for Recipient {
    type Error = AppError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        let membership_tier = row
            .membership_tier
            .as_deref()
            .map(str::parse::<MembershipTier>)
            .transpose()
            .map_err(|e| {
                AppError::internal("Corrupt account row", json!({ "id": row.id, "reason": e }))
            })?;

        Ok(Recipient {
            id: row.id,
            email: row.email,
            opted_in: row.marketing_opt_in,
            active: row.is_active,
            membership_tier,
            total_spent_cents: row.total_spent_cents,
            unsubscribe_token: row.unsubscribe_token,
        })
    }
}

/// PostgreSQL repository for recipients.
pub struct PgRecipientRepository {
    pool: Arc<PgPool>,
}

impl PgRecipientRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientRepository for PgRecipientRepository {
    async fn find_audience(&self, query: AudienceQuery) -> Result<Vec<Recipient>, AppError> {
        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM accounts WHERE {AUDIENCE_PREDICATE} ORDER BY id"
        );

        let rows = sqlx::query_as::<_, RecipientRow>(&sql)
            .bind(query.require_opt_in)
            .bind(query.tier_names())
            .bind(query.min_spend_cents)
            .bind(query.max_spend_cents)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(Recipient::try_from).collect()
    }

    async fn count_audience(&self, query: AudienceQuery) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM accounts WHERE {AUDIENCE_PREDICATE}");

        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(query.require_opt_in)
            .bind(query.tier_names())
            .bind(query.min_spend_cents)
            .bind(query.max_spend_cents)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Recipient>, AppError> {
        let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM accounts WHERE id = $1");

        let row = sqlx::query_as::<_, RecipientRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(Recipient::try_from).transpose()
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Recipient>, AppError> {
        let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM accounts WHERE unsubscribe_token = $1");

        let row = sqlx::query_as::<_, RecipientRow>(&sql)
            .bind(token)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(Recipient::try_from).transpose()
    }

    async fn assign_unsubscribe_token(&self, id: i64, token: &str) -> Result<String, AppError> {
        let stored = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE accounts
            SET unsubscribe_token = COALESCE(unsubscribe_token, $2)
            WHERE id = $1
            RETURNING unsubscribe_token
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        stored.ok_or_else(|| AppError::not_found("Recipient not found", json!({ "id": id })))
    }

    async fn opt_out(&self, id: i64) -> Result<Recipient, AppError> {
        let sql = format!(
            "UPDATE accounts SET marketing_opt_in = FALSE WHERE id = $1 RETURNING {RECIPIENT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, RecipientRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.ok_or_else(|| AppError::not_found("Recipient not found", json!({ "id": id })))?
            .try_into()
    }
}
