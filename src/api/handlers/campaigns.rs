//! Handlers for campaign authoring and lifecycle endpoints.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::campaign::{
    CampaignResponse, CreateCampaignRequest, SendTestRequest, SendTestResponse,
    UpdateCampaignRequest,
};
use crate::api::dto::delivery::{DeliveryItem, DeliveryStatsResponse};
use crate::api::dto::pagination::{CampaignListQuery, DeliveryListQuery};
use crate::application::services::Operator;
use crate::domain::entities::Page;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a draft campaign.
///
/// # Endpoint
///
/// `POST /api/campaigns`
///
/// The authenticated token name is recorded as `created_by`.
///
/// # Errors
///
/// Returns 400 if a required field is blank or the targeting spec is invalid.
pub async fn create_campaign_handler(
    State(state): State<AppState>,
    operator: Option<Extension<Operator>>,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), AppError> {
    payload.validate()?;

    let created_by = operator.map(|Extension(op)| op.name);
    let campaign = state
        .campaign_service
        .create(payload.into_new_campaign(created_by))
        .await?;

    Ok((StatusCode::CREATED, Json(campaign.into())))
}

/// Lists campaigns, newest first.
///
/// # Endpoint
///
/// `GET /api/campaigns?status=&page=&page_size=`
pub async fn list_campaigns_handler(
    State(state): State<AppState>,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<Page<CampaignResponse>>, AppError> {
    let page = query.pagination.to_page_request()?;
    let status = query.status()?;

    let campaigns = state.campaign_service.list(status, page).await?;

    Ok(Json(campaigns.map(CampaignResponse::from)))
}

/// `GET /api/campaigns/{id}`
pub async fn get_campaign_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = state.campaign_service.get(id).await?;
    Ok(Json(campaign.into()))
}

/// Partially updates a draft campaign.
///
/// # Endpoint
///
/// `PATCH /api/campaigns/{id}`
///
/// # Errors
///
/// Returns 404 if the campaign does not exist.
/// Returns 409 `campaign_locked` once it has been dispatched.
pub async fn update_campaign_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, AppError> {
    payload.validate()?;

    let campaign = state.campaign_service.update(id, payload.into()).await?;

    Ok(Json(campaign.into()))
}

/// Deletes a campaign together with its delivery log.
///
/// # Endpoint
///
/// `DELETE /api/campaigns/{id}`
///
/// # Errors
///
/// Returns 404 if the campaign does not exist.
/// Returns 409 `campaign_locked` while it is sending.
pub async fn delete_campaign_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if state.campaign_service.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::campaign_not_found(id))
    }
}

/// Dispatches a draft campaign.
///
/// # Endpoint
///
/// `POST /api/campaigns/{id}/dispatch`
///
/// Responds once delivery rows exist and the send loop is started; the
/// campaign is returned as `sending`. An empty audience finishes
/// immediately and is returned as `sent`.
///
/// # Errors
///
/// Returns 404 if the campaign does not exist.
/// Returns 409 `already_dispatched` if it is not a draft.
pub async fn dispatch_campaign_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CampaignResponse>), AppError> {
    let campaign = state.dispatch_service.dispatch(id).await?;
    Ok((StatusCode::ACCEPTED, Json(campaign.into())))
}

/// Sends one test message.
///
/// # Endpoint
///
/// `POST /api/campaigns/{id}/test`
///
/// No delivery row is written and the campaign is left untouched.
///
/// # Errors
///
/// Returns 400 for a malformed address.
/// Returns 502 if the mail gateway rejects the message.
pub async fn send_test_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<SendTestRequest>,
) -> Result<Json<SendTestResponse>, AppError> {
    let sent = state
        .campaign_service
        .send_test(id, &payload.address)
        .await?;
    Ok(Json(SendTestResponse { sent }))
}

/// `POST /api/campaigns/{id}/pause`
///
/// Returns 409 `campaign_not_sending` unless the campaign is sending.
pub async fn pause_campaign_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = state.dispatch_service.pause(id).await?;
    Ok(Json(campaign.into()))
}

/// `POST /api/campaigns/{id}/resume`
///
/// Returns 409 `campaign_not_sending` unless the campaign is sending.
pub async fn resume_campaign_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = state.dispatch_service.resume(id).await?;
    Ok(Json(campaign.into()))
}

/// Lists a campaign's delivery rows in send order.
///
/// # Endpoint
///
/// `GET /api/campaigns/{id}/deliveries?status=&page=&page_size=`
pub async fn list_deliveries_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Query(query): Query<DeliveryListQuery>,
) -> Result<Json<Page<DeliveryItem>>, AppError> {
    let page = query.pagination.to_page_request()?;
    let status = query.status()?;

    let deliveries = state
        .campaign_service
        .list_deliveries(id, status, page)
        .await?;

    Ok(Json(deliveries.map(DeliveryItem::from)))
}

/// Live delivery counts by status.
///
/// # Endpoint
///
/// `GET /api/campaigns/{id}/stats`
pub async fn campaign_stats_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<DeliveryStatsResponse>, AppError> {
    let counts = state.campaign_service.delivery_stats(id).await?;

    Ok(Json(DeliveryStatsResponse {
        campaign_id: id,
        pending: counts.pending,
        sent: counts.sent,
        failed: counts.failed,
        total: counts.total(),
    }))
}
