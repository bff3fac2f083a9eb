//! Core domain entities of the campaign dispatch engine.
//!
//! # Entity Types
//!
//! - [`Campaign`] - One bulk-messaging job with its content, audience rule and lifecycle
//! - [`Recipient`] - Read-only view of a storefront account
//! - [`DeliveryLog`] - Audit row for one attempted send
//! - [`TargetingSpec`] - Structured audience filter
//!
//! Creation inputs use separate structs (`NewCampaign`, `NewRecipient`,
//! `NewDeliveryLog`); partial updates use [`CampaignPatch`].

pub mod campaign;
pub mod delivery_log;
pub mod page;
pub mod recipient;
pub mod targeting;

pub use campaign::{Campaign, CampaignOutcome, CampaignPatch, CampaignStatus, NewCampaign};
pub use delivery_log::{DeliveryCounts, DeliveryLog, DeliveryStatus, NewDeliveryLog};
pub use page::{Page, PageRequest};
pub use recipient::{NewRecipient, Recipient};
pub use targeting::{MembershipTier, TargetingSpec};
