//! Application layer: services orchestrating repositories, rendering and the
//! transport, plus the background send loop.
//!
//! # Available Services
//!
//! - [`services::CampaignService`] - Authoring, test sends, delivery inspection
//! - [`services::DispatchService`] - Dispatch state machine, pause/resume, recovery
//! - [`services::AudienceService`] - Audience resolution and preview
//! - [`services::UnsubscribeService`] - Token issuance and opt-out
//! - [`services::AuthService`] - Operator token authentication
//!
//! [`dispatch_worker::DispatchWorker`] runs the detached per-campaign send loop.

pub mod dispatch_worker;
pub mod services;
