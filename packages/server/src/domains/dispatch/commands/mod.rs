use serde::{Deserialize, Serialize};

use crate::common::{Actor, GeoPoint, HospitalId, RequestId, ResponderId};
use crate::domains::dispatch::models::{EmergencyRequest, NewEmergencyRequest, RequestStatus};
use crate::domains::presence::models::ResponderPresence;
use crate::domains::routing::RouteSummary;

/// Inbound messages, one variant per kind.
///
/// Every transport (HTTP, socket bridge, tests) decodes into this enum and
/// hands it to the session manager, which matches it exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    CreateRequest(NewEmergencyRequest),

    Accept {
        request_id: RequestId,
        responder_id: ResponderId,
    },

    Reject {
        request_id: RequestId,
        responder_id: ResponderId,
        #[serde(default)]
        reason: Option<String>,
    },

    Cancel {
        request_id: RequestId,
        actor: Actor,
        #[serde(default)]
        reason: Option<String>,
    },

    AdvanceStatus {
        request_id: RequestId,
        actor: Actor,
        target: RequestStatus,
    },

    SelectDestination {
        request_id: RequestId,
        actor: Actor,
        hospital_id: HospitalId,
    },

    AssignResponder {
        request_id: RequestId,
        actor: Actor,
        responder_id: ResponderId,
    },

    Rate {
        request_id: RequestId,
        actor: Actor,
        score: u8,
        #[serde(default)]
        comment: Option<String>,
    },

    LocationUpdate {
        responder_id: ResponderId,
        position: GeoPoint,
    },

    GoOnline {
        responder_id: ResponderId,
        position: GeoPoint,
    },

    GoOffline { responder_id: ResponderId },
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRequest(_) => "create_request",
            Self::Accept { .. } => "accept",
            Self::Reject { .. } => "reject",
            Self::Cancel { .. } => "cancel",
            Self::AdvanceStatus { .. } => "advance_status",
            Self::SelectDestination { .. } => "select_destination",
            Self::AssignResponder { .. } => "assign_responder",
            Self::Rate { .. } => "rate",
            Self::LocationUpdate { .. } => "location_update",
            Self::GoOnline { .. } => "go_online",
            Self::GoOffline { .. } => "go_offline",
        }
    }
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundReply {
    Request(Box<EmergencyRequest>),
    Route(RouteSummary),
    Responder(Box<ResponderPresence>),
    Acknowledged { request_id: RequestId },
}
