//! Public unsubscribe endpoints.
//!
//! Both forms are idempotent: repeating a request, or using a token that
//! is unknown, yields a definite answer and never an error status.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::unsubscribe::UnsubscribeResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Confirmation page shown after following an unsubscribe link.
#[derive(Template, WebTemplate)]
#[template(path = "unsubscribe.html")]
pub struct UnsubscribeTemplate {
    pub unsubscribed: bool,
}

/// Opts the recipient out and renders a confirmation page.
///
/// # Endpoint
///
/// `GET /unsubscribe/{token}`
///
/// Always 200. An unknown token renders the "not recognised" variant.
pub async fn unsubscribe_page_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<UnsubscribeTemplate, AppError> {
    let unsubscribed = state.unsubscribe_service.unsubscribe(&token).await?;
    Ok(UnsubscribeTemplate { unsubscribed })
}

/// One-click opt-out for mail clients (`List-Unsubscribe-Post`).
///
/// # Endpoint
///
/// `POST /unsubscribe/{token}`
///
/// # Response
///
/// ```json
/// { "unsubscribed": true }
/// ```
pub async fn unsubscribe_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    let unsubscribed = state.unsubscribe_service.unsubscribe(&token).await?;
    Ok(Json(UnsubscribeResponse { unsubscribed }))
}
