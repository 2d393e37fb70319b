//! SSE streaming endpoint.
//!
//! GET /streams/:topic
//!
//! Topics are `requester:{id}`, `responder:{id}` and `request:{id}`. The id
//! is the access credential; authentication is left to the fronting proxy.
//! Each dispatch event becomes one SSE event named after its wire kind.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::domains::gateway::Topic;
use crate::server::app::AppState;

pub async fn stream_handler(
    Extension(state): Extension<AppState>,
    Path(topic): Path<String>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let topic: Topic = topic.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let rx = state.sessions.deps().gateway.subscribe(topic).await;
    tracing::debug!(topic = %topic, "stream subscribed");

    let connected =
        stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });

    let events = BroadcastStream::new(rx).filter_map(|result| async {
        match result {
            Ok(event) => Event::default()
                .event(event.kind())
                .json_data(&event)
                .ok()
                .map(Ok),
            Err(BroadcastStreamRecvError::Lagged(n)) => Event::default()
                .event("lagged")
                .json_data(serde_json::json!({ "missed": n }))
                .ok()
                .map(Ok),
        }
    });

    Ok(Sse::new(connected.chain(events)).keep_alive(KeepAlive::default()))
}
