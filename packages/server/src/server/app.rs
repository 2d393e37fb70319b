//! Application setup and server configuration.

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domains::dispatch::SessionManager;
use crate::server::routes::{health, messages, requests, responders, stream};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    /// Present only when running against Postgres (health probe)
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(sessions: SessionManager, db_pool: Option<PgPool>) -> Self {
        Self { sessions, db_pool }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let router = Router::new()
        // Requests
        .route("/requests", post(requests::create_request))
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/accept", post(requests::accept_offer))
        .route("/requests/:id/reject", post(requests::reject_offer))
        .route("/requests/:id/assign", post(requests::assign_responder))
        .route("/requests/:id/status", post(requests::advance_status))
        .route("/requests/:id/cancel", post(requests::cancel_request))
        .route("/requests/:id/destination", post(requests::select_destination))
        .route("/requests/:id/rating", post(requests::rate_service))
        // Responders
        .route("/responders", post(responders::register_responder))
        .route("/responders/:id", get(responders::get_responder))
        .route("/responders/:id/online", post(responders::go_online))
        .route("/responders/:id/offline", post(responders::go_offline))
        .route("/responders/:id/maintenance", post(responders::set_maintenance))
        .route("/responders/:id/location", post(responders::update_location))
        // Typed inbound messages (socket bridges post here)
        .route("/messages", post(messages::handle_message))
        // Event streams
        .route("/streams/:topic", get(stream::stream_handler))
        .route("/health", get(health::health_handler));

    router
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Allow any origin unless an explicit list is configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
