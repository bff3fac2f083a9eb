//! Repository trait over the account store.

use crate::domain::audience::AudienceQuery;
use crate::domain::entities::Recipient;
use crate::error::AppError;
use async_trait::async_trait;

/// Read access to recipients plus the two writes this engine is allowed:
/// unsubscribe-token issuance and opt-out.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgRecipientRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - in-memory implementation for tests
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Returns every recipient matching the query, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_audience(&self, query: AudienceQuery) -> Result<Vec<Recipient>, AppError>;

    /// Counts recipients matching the query without loading them.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count_audience(&self, query: AudienceQuery) -> Result<i64, AppError>;

    /// Finds a recipient by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Recipient>, AppError>;

    /// Finds the recipient owning an unsubscribe token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_token(&self, token: &str) -> Result<Option<Recipient>, AppError>;

    /// Stores `token` unless the recipient already has one, and returns the
    /// token now on record.
    ///
    /// A concurrent issuer that lost the race gets the winner's token back.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the recipient does not exist.
    /// Returns [`AppError::Conflict`] if `token` belongs to another recipient.
    /// Returns [`AppError::Internal`] on database errors.
    async fn assign_unsubscribe_token(&self, id: i64, token: &str) -> Result<String, AppError>;

    /// Clears the marketing opt-in flag and returns the updated recipient.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the recipient does not exist.
    /// Returns [`AppError::Internal`] on database errors.
    async fn opt_out(&self, id: i64) -> Result<Recipient, AppError>;
}
