//! API route configuration.
//!
//! All API endpoints require Bearer token authentication via
//! [`crate::api::middleware::auth`].

use crate::api::handlers::{
    audience_preview_handler, campaign_stats_handler, create_campaign_handler,
    delete_campaign_handler, dispatch_campaign_handler, get_campaign_handler,
    list_campaigns_handler, list_deliveries_handler, pause_campaign_handler,
    resume_campaign_handler, send_test_handler, unsubscribe_handler, unsubscribe_page_handler,
    update_campaign_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Operator routes, protected by Bearer token authentication.
///
/// # Endpoints
///
/// - `GET    /campaigns`                 - List campaigns (paginated, status filter)
/// - `POST   /campaigns`                 - Create a draft campaign
/// - `GET    /campaigns/{id}`            - Fetch a campaign
/// - `PATCH  /campaigns/{id}`            - Edit a draft campaign
/// - `DELETE /campaigns/{id}`            - Delete a campaign and its delivery log
/// - `POST   /campaigns/{id}/dispatch`   - Start the send
/// - `POST   /campaigns/{id}/test`       - Send one test message
/// - `POST   /campaigns/{id}/pause`      - Halt the send loop
/// - `POST   /campaigns/{id}/resume`     - Continue a paused send
/// - `GET    /campaigns/{id}/deliveries` - Delivery rows (paginated, status filter)
/// - `GET    /campaigns/{id}/stats`      - Live delivery counts
/// - `POST   /audience/preview`          - Count recipients a targeting spec reaches
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/campaigns",
            get(list_campaigns_handler).post(create_campaign_handler),
        )
        .route(
            "/campaigns/{id}",
            get(get_campaign_handler)
                .patch(update_campaign_handler)
                .delete(delete_campaign_handler),
        )
        .route("/campaigns/{id}/dispatch", post(dispatch_campaign_handler))
        .route("/campaigns/{id}/test", post(send_test_handler))
        .route("/campaigns/{id}/pause", post(pause_campaign_handler))
        .route("/campaigns/{id}/resume", post(resume_campaign_handler))
        .route("/campaigns/{id}/deliveries", get(list_deliveries_handler))
        .route("/campaigns/{id}/stats", get(campaign_stats_handler))
        .route("/audience/preview", post(audience_preview_handler))
}

/// Public recipient-facing routes.
///
/// - `GET  /unsubscribe/{token}` - Opt out and show a confirmation page
/// - `POST /unsubscribe/{token}` - One-click opt-out, JSON response
pub fn public_routes() -> Router<AppState> {
    Router::new().route(
        "/unsubscribe/{token}",
        get(unsubscribe_page_handler).post(unsubscribe_handler),
    )
}
