//! Unsubscribe token issuance and opt-out.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::domain::entities::Recipient;
use crate::domain::repositories::RecipientRepository;
use crate::error::AppError;
use crate::utils::token_generator::{generate_unsubscribe_token, is_plausible};

/// Attempts to find an unused token before giving up.
const MAX_TOKEN_ATTEMPTS: usize = 5;

/// Issues stable opt-out tokens and processes opt-outs.
pub struct UnsubscribeService {
    recipients: Arc<dyn RecipientRepository>,
}

impl UnsubscribeService {
    pub fn new(recipients: Arc<dyn RecipientRepository>) -> Self {
        Self { recipients }
    }

    /// Returns the recipient's token, issuing one if absent.
    ///
    /// An existing token is returned unchanged with no write: tokens already
    /// embedded in sent messages must keep working. `recipient` is updated
    /// in place with the token on record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if no unique token could be allocated
    /// or the random source fails.
    pub async fn ensure_token(&self, recipient: &mut Recipient) -> Result<String, AppError> {
        if let Some(token) = &recipient.unsubscribe_token {
            return Ok(token.clone());
        }

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = generate_unsubscribe_token().map_err(|e| {
                AppError::internal("Token generation failed", json!({ "reason": e.to_string() }))
            })?;

            if self.recipients.find_by_token(&candidate).await?.is_some() {
                continue;
            }

            match self
                .recipients
                .assign_unsubscribe_token(recipient.id, &candidate)
                .await
            {
                Ok(stored) => {
                    recipient.unsubscribe_token = Some(stored.clone());
                    return Ok(stored);
                }
                Err(AppError::Conflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        warn!(
            recipient_id = recipient.id,
            "Could not allocate a unique unsubscribe token"
        );
        Err(AppError::internal(
            "Failed to allocate unsubscribe token",
            json!({ "recipient_id": recipient.id, "attempts": MAX_TOKEN_ATTEMPTS }),
        ))
    }

    /// Opts out the recipient owning `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no recipient owns the token.
    pub async fn revoke(&self, token: &str) -> Result<Recipient, AppError> {
        let recipient = self
            .recipients
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::not_found("Unknown unsubscribe token", json!({})))?;

        if !recipient.opted_in {
            return Ok(recipient);
        }

        let updated = self.recipients.opt_out(recipient.id).await?;
        info!(recipient_id = updated.id, "Recipient unsubscribed");
        metrics::counter!("unsubscribes_total").increment(1);
        Ok(updated)
    }

    /// Public, idempotent opt-out.
    ///
    /// Returns `true` when the token is known (the recipient is now opted
    /// out, whether or not they already were) and `false` for an unknown,
    /// empty or oversized token. Never fails on bad input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store errors.
    pub async fn unsubscribe(&self, token: &str) -> Result<bool, AppError> {
        if !is_plausible(token) {
            return Ok(false);
        }

        match self.revoke(token).await {
            Ok(_) => Ok(true),
            Err(AppError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockRecipientRepository;
    use crate::utils::token_generator::TOKEN_LENGTH;

    fn recipient(token: Option<&str>, opted_in: bool) -> Recipient {
        Recipient {
            id: 42,
            email: Some("r@example.com".to_string()),
            opted_in,
            active: true,
            membership_tier: None,
            total_spent_cents: 0,
            unsubscribe_token: token.map(str::to_string),
        }
    }

    fn valid_token() -> String {
        "A".repeat(TOKEN_LENGTH)
    }

    #[tokio::test]
    async fn test_existing_token_is_returned_without_write() {
        let mut repo = MockRecipientRepository::new();
        repo.expect_find_by_token().never();
        repo.expect_assign_unsubscribe_token().never();

        let service = UnsubscribeService::new(Arc::new(repo));
        let mut r = recipient(Some("existing"), true);

        assert_eq!(service.ensure_token(&mut r).await.unwrap(), "existing");
        assert_eq!(service.ensure_token(&mut r).await.unwrap(), "existing");
    }

    #[tokio::test]
    async fn test_token_is_issued_once() {
        let mut repo = MockRecipientRepository::new();
        repo.expect_find_by_token().times(1).returning(|_| Ok(None));
        repo.expect_assign_unsubscribe_token()
            .withf(|id, token| *id == 42 && token.len() == TOKEN_LENGTH)
            .times(1)
            .returning(|_, token| Ok(token.to_string()));

        let service = UnsubscribeService::new(Arc::new(repo));
        let mut r = recipient(None, true);

        let first = service.ensure_token(&mut r).await.unwrap();
        let second = service.ensure_token(&mut r).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(r.unsubscribe_token.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn test_lost_race_adopts_stored_token() {
        let mut repo = MockRecipientRepository::new();
        repo.expect_find_by_token().returning(|_| Ok(None));
        repo.expect_assign_unsubscribe_token()
            .times(1)
            .returning(|_, _| Ok("winner".to_string()));

        let service = UnsubscribeService::new(Arc::new(repo));
        let mut r = recipient(None, true);

        assert_eq!(service.ensure_token(&mut r).await.unwrap(), "winner");
        assert_eq!(r.unsubscribe_token.as_deref(), Some("winner"));
    }

    #[tokio::test]
    async fn test_collision_retries_with_new_candidate() {
        let mut repo = MockRecipientRepository::new();
        let mut seen = 0;
        repo.expect_find_by_token().times(2).returning(move |_| {
            seen += 1;
            Ok((seen == 1).then(|| recipient(Some("taken"), true)))
        });
        repo.expect_assign_unsubscribe_token()
            .times(1)
            .returning(|_, token| Ok(token.to_string()));

        let service = UnsubscribeService::new(Arc::new(repo));
        let mut r = recipient(None, true);

        assert!(service.ensure_token(&mut r).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_unknown_token_is_not_found() {
        let mut repo = MockRecipientRepository::new();
        repo.expect_find_by_token().returning(|_| Ok(None));

        let service = UnsubscribeService::new(Arc::new(repo));

        assert!(matches!(
            service.revoke("nope").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let mut repo = MockRecipientRepository::new();
        let mut opted_in = true;
        repo.expect_find_by_token()
            .times(2)
            .returning(move |token| {
                let r = recipient(Some(token), opted_in);
                opted_in = false;
                Ok(Some(r))
            });
        repo.expect_opt_out()
            .times(1)
            .returning(|_| Ok(recipient(None, false)));

        let service = UnsubscribeService::new(Arc::new(repo));
        let token = valid_token();

        assert!(service.unsubscribe(&token).await.unwrap());
        assert!(service.unsubscribe(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsubscribe_oversized_token_skips_lookup() {
        let mut repo = MockRecipientRepository::new();
        repo.expect_find_by_token().never();

        let service = UnsubscribeService::new(Arc::new(repo));

        assert!(!service.unsubscribe("").await.unwrap());
        assert!(!service.unsubscribe(&"a".repeat(300)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsubscribe_accepts_legacy_token_shape() {
        let legacy = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

        let mut repo = MockRecipientRepository::new();
        repo.expect_find_by_token()
            .withf(move |token| token == legacy)
            .times(1)
            .returning(|token| Ok(Some(recipient(Some(token), true))));
        repo.expect_assign_unsubscribe_token().never();
        repo.expect_opt_out()
            .withf(|id| *id == 42)
            .times(1)
            .returning(|_| Ok(recipient(None, false)));

        let service = UnsubscribeService::new(Arc::new(repo));
        let mut r = recipient(Some(legacy), true);

        let embedded = service.ensure_token(&mut r).await.unwrap();
        assert_eq!(embedded, legacy);
        assert!(service.unsubscribe(&embedded).await.unwrap());
    }
}
