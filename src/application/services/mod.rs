//! Business logic services for the application layer.

pub mod audience_service;
pub mod auth_service;
pub mod campaign_service;
pub mod dispatch_service;
pub mod unsubscribe_service;

pub use audience_service::AudienceService;
pub use auth_service::{AuthService, Operator};
pub use campaign_service::CampaignService;
pub use dispatch_service::{DispatchService, Dispatched};
pub use unsubscribe_service::UnsubscribeService;
