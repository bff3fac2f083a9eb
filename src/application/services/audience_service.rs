//! Audience resolution and preview.

use std::sync::Arc;

use tracing::debug;

use crate::domain::audience::{AudienceCount, AudienceQuery};
use crate::domain::entities::{Recipient, TargetingSpec};
use crate::domain::repositories::RecipientRepository;
use crate::error::AppError;

/// Translates targeting specs into recipient lists. Read-only.
pub struct AudienceService {
    recipients: Arc<dyn RecipientRepository>,
}

impl AudienceService {
    pub fn new(recipients: Arc<dyn RecipientRepository>) -> Self {
        Self { recipients }
    }

    /// Resolves the dispatch audience for a spec, ordered by recipient id.
    ///
    /// The base filter (opted in, active, address present) always applies.
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a malformed spec.
    pub async fn resolve(&self, spec: &TargetingSpec) -> Result<Vec<Recipient>, AppError> {
        spec.validate()?;

        let query = AudienceQuery::for_dispatch(spec);
        let mut recipients = self.recipients.find_audience(query.clone()).await?;

        // Whatever the backing store returns, never let an ineligible row through.
        let fetched = recipients.len();
        recipients.retain(|r| query.matches(r));
        if recipients.len() != fetched {
            debug!(
                dropped = fetched - recipients.len(),
                "Store returned recipients outside the audience filter"
            );
        }

        Ok(recipients)
    }

    /// Estimates audience size without materializing anything.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a malformed spec.
    pub async fn preview_count(&self, spec: &TargetingSpec) -> Result<AudienceCount, AppError> {
        spec.validate()?;

        let total_eligible = self
            .recipients
            .count_audience(AudienceQuery::ignoring_opt_in(spec))
            .await?;
        let total_opted_in = self
            .recipients
            .count_audience(AudienceQuery::for_dispatch(spec))
            .await?;

        Ok(AudienceCount {
            total_eligible,
            total_opted_in,
        })
    }
}
