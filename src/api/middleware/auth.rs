//! Bearer token authentication for operator endpoints.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// Authenticates the request and attaches the [`Operator`] as an extension.
///
/// # Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// Handlers read the caller with `Extension<Operator>`; campaign creation
/// records its name as `created_by`.
///
/// # Errors
///
/// Returns `401 Unauthorized` if the header is missing or malformed, or the
/// token is unknown or revoked.
///
/// [`Operator`]: crate::application::services::Operator
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let AuthBearer(token) = AuthBearer::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            AppError::unauthorized(
                "Unauthorized",
                json!({"reason": "Authorization header is missing or invalid"}),
            )
        })?;

    let operator = st.auth_service.authenticate(&token).await?;
    tracing::debug!(operator = %operator.name, "Operator authenticated");

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(operator);

    Ok(next.run(req).await)
}
