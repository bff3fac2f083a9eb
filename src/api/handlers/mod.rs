//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod audience;
pub mod campaigns;
pub mod health;
pub mod unsubscribe;

pub use audience::audience_preview_handler;
pub use campaigns::{
    campaign_stats_handler, create_campaign_handler, delete_campaign_handler,
    dispatch_campaign_handler, get_campaign_handler, list_campaigns_handler,
    list_deliveries_handler, pause_campaign_handler, resume_campaign_handler, send_test_handler,
    update_campaign_handler,
};
pub use health::health_handler;
pub use unsubscribe::{unsubscribe_handler, unsubscribe_page_handler};
