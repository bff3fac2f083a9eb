//! Repository implementations.
//!
//! PostgreSQL repositories use runtime-checked `sqlx::query_as` with `FromRow`
//! row structs; [`MemoryStore`] implements the same traits in memory.
//!
//! # Repositories
//!
//! - [`PgCampaignRepository`] - Campaigns and conditional lifecycle transitions
//! - [`PgRecipientRepository`] - Audience queries over `accounts`
//! - [`PgDeliveryLogRepository`] - Bulk insert, cursor, settlement, aggregation
//! - [`PgTokenRepository`] - Operator API tokens
//! - [`MemoryStore`] - All of the above, non-durable

pub mod memory;
pub mod pg_campaign_repository;
pub mod pg_delivery_log_repository;
pub mod pg_recipient_repository;
pub mod pg_token_repository;

pub use memory::MemoryStore;
pub use pg_campaign_repository::PgCampaignRepository;
pub use pg_delivery_log_repository::PgDeliveryLogRepository;
pub use pg_recipient_repository::PgRecipientRepository;
pub use pg_token_repository::PgTokenRepository;
