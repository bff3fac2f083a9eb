//! Handler for audience preview.

use axum::{Json, extract::State};

use crate::api::dto::audience::AudiencePreviewRequest;
use crate::domain::audience::AudienceCount;
use crate::error::AppError;
use crate::state::AppState;

/// Counts who a targeting spec would reach, without dispatching anything.
///
/// # Endpoint
///
/// `POST /api/audience/preview`
///
/// # Response
///
/// ```json
/// { "total_eligible": 120, "total_opted_in": 87 }
/// ```
///
/// # Errors
///
/// Returns 400 if the targeting spec is malformed.
pub async fn audience_preview_handler(
    State(state): State<AppState>,
    Json(payload): Json<AudiencePreviewRequest>,
) -> Result<Json<AudienceCount>, AppError> {
    let count = state
        .audience_service
        .preview_count(&payload.targeting)
        .await?;
    Ok(Json(count))
}
