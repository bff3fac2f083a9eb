//! Repository trait definitions for the domain layer.
//!
//! Traits define the data contracts; implementations live in
//! `crate::infrastructure::persistence`. Mock implementations are generated
//! with `mockall` for service tests.
//!
//! # Available Repositories
//!
//! - [`CampaignRepository`] - Campaign storage and conditional lifecycle transitions
//! - [`RecipientRepository`] - Audience queries, token issuance, opt-out
//! - [`DeliveryLogRepository`] - Bulk insert, per-row settlement, count-by-status
//! - [`TokenRepository`] - Operator API tokens

pub mod campaign_repository;
pub mod delivery_log_repository;
pub mod recipient_repository;
pub mod token_repository;

pub use campaign_repository::CampaignRepository;
pub use delivery_log_repository::DeliveryLogRepository;
pub use recipient_repository::RecipientRepository;
pub use token_repository::{ApiToken, TokenRepository};

#[cfg(test)]
pub use campaign_repository::MockCampaignRepository;
#[cfg(test)]
pub use delivery_log_repository::MockDeliveryLogRepository;
#[cfg(test)]
pub use recipient_repository::MockRecipientRepository;
#[cfg(test)]
pub use token_repository::MockTokenRepository;
