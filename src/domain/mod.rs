//! Domain layer: entities, audience selection, rendering and the contracts
//! implemented by infrastructure.
//!
//! # Architecture
//!
//! - [`entities`] - Campaign, recipient and delivery-log data structures
//! - [`audience`] - Pure translation of a targeting spec into a recipient filter
//! - [`message`] - Per-recipient and test message rendering
//! - [`repositories`] - Data access trait definitions
//! - [`transport`] - Outbound mail gateway contract
//!
//! The domain layer has no dependency on infrastructure or HTTP code.

pub mod audience;
pub mod entities;
pub mod message;
pub mod repositories;
pub mod transport;
