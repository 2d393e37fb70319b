//! Single entry point for typed inbound messages.
//!
//! POST /messages with a `kind`-tagged JSON body. Unknown kinds and
//! malformed payloads are rejected as validation errors before anything
//! reaches the session manager.

use axum::{extract::Extension, Json};

use crate::domains::dispatch::InboundReply;
use crate::domains::gateway::EventGateway;
use crate::server::app::AppState;
use crate::server::error::ApiResult;

pub async fn handle_message(
    Extension(state): Extension<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> ApiResult<Json<InboundReply>> {
    let message = EventGateway::decode(raw)?;
    Ok(Json(state.sessions.handle(message).await?))
}
