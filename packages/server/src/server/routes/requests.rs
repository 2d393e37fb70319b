//! Request lifecycle endpoints.
//!
//! Thin adapters: decode, call the session manager, encode. Every rule lives
//! in the session manager.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::common::{Actor, HospitalId, RequestId, ResponderId};
use crate::domains::dispatch::models::{EmergencyRequest, NewEmergencyRequest, RequestStatus};
use crate::domains::routing::RouteSummary;
use crate::server::app::AppState;
use crate::server::error::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferReply {
    pub responder_id: ResponderId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    pub actor: Actor,
    pub responder_id: ResponderId,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceBody {
    pub actor: Actor,
    pub target: RequestStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub actor: Actor,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationBody {
    pub actor: Actor,
    pub hospital_id: HospitalId,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub actor: Actor,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn create_request(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewEmergencyRequest>,
) -> ApiResult<(StatusCode, Json<EmergencyRequest>)> {
    let request = state.sessions.create_request(input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_request(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
) -> ApiResult<Json<EmergencyRequest>> {
    Ok(Json(state.sessions.get_request(id).await?))
}

pub async fn accept_offer(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<OfferReply>,
) -> ApiResult<Json<EmergencyRequest>> {
    Ok(Json(state.sessions.accept_offer(id, body.responder_id).await?))
}

pub async fn reject_offer(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<OfferReply>,
) -> ApiResult<StatusCode> {
    state
        .sessions
        .reject_offer(id, body.responder_id, body.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_responder(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<AssignBody>,
) -> ApiResult<Json<EmergencyRequest>> {
    Ok(Json(
        state
            .sessions
            .assign_responder(id, body.actor, body.responder_id)
            .await?,
    ))
}

pub async fn advance_status(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<AdvanceBody>,
) -> ApiResult<Json<EmergencyRequest>> {
    Ok(Json(
        state
            .sessions
            .advance_status(id, body.actor, body.target)
            .await?,
    ))
}

pub async fn cancel_request(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<CancelBody>,
) -> ApiResult<Json<EmergencyRequest>> {
    Ok(Json(
        state
            .sessions
            .cancel_request(id, body.actor, body.reason)
            .await?,
    ))
}

pub async fn select_destination(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<DestinationBody>,
) -> ApiResult<Json<RouteSummary>> {
    Ok(Json(
        state
            .sessions
            .select_destination(id, body.actor, body.hospital_id)
            .await?,
    ))
}

pub async fn rate_service(
    Extension(state): Extension<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<RatingBody>,
) -> ApiResult<Json<EmergencyRequest>> {
    Ok(Json(
        state
            .sessions
            .rate_service(id, body.actor, body.score, body.comment)
            .await?,
    ))
}
