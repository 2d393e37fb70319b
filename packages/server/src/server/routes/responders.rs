use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::common::{GeoPoint, ResponderId};
use crate::domains::presence::models::{ResponderClass, ResponderPresence, ServiceTier};
use crate::server::app::AppState;
use crate::server::error::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub responder_id: Option<ResponderId>,
    pub class: ResponderClass,
    #[serde(default)]
    pub tier: ServiceTier,
    #[serde(default)]
    pub position: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
pub struct PositionBody {
    pub position: GeoPoint,
}

pub async fn register_responder(
    Extension(state): Extension<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<(StatusCode, Json<ResponderPresence>)> {
    let record = state
        .sessions
        .register_responder(body.responder_id, body.class, body.tier, body.position)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_responder(
    Extension(state): Extension<AppState>,
    Path(id): Path<ResponderId>,
) -> ApiResult<Json<ResponderPresence>> {
    Ok(Json(state.sessions.get_responder(id)?))
}

pub async fn go_online(
    Extension(state): Extension<AppState>,
    Path(id): Path<ResponderId>,
    Json(body): Json<PositionBody>,
) -> ApiResult<Json<ResponderPresence>> {
    Ok(Json(state.sessions.set_online(id, body.position).await?))
}

pub async fn go_offline(
    Extension(state): Extension<AppState>,
    Path(id): Path<ResponderId>,
) -> ApiResult<Json<ResponderPresence>> {
    Ok(Json(state.sessions.set_offline(id).await?))
}

pub async fn set_maintenance(
    Extension(state): Extension<AppState>,
    Path(id): Path<ResponderId>,
) -> ApiResult<Json<ResponderPresence>> {
    Ok(Json(state.sessions.set_maintenance(id).await?))
}

pub async fn update_location(
    Extension(state): Extension<AppState>,
    Path(id): Path<ResponderId>,
    Json(body): Json<PositionBody>,
) -> ApiResult<Json<ResponderPresence>> {
    Ok(Json(state.sessions.update_position(id, body.position).await?))
}
