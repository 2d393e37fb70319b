use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{GeoPoint, HospitalId, Location, RequestId, RequesterId, ResponderId};
use crate::domains::dispatch::models::{EmergencyType, RequestStatus, Severity};
use crate::domains::presence::models::{ResponderClass, ResponderPresence, ServiceTier};
use crate::domains::ranking::models::HospitalSuggestion;
use crate::domains::routing::RouteSummary;

/// What the requester learns about the unit that accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderSummary {
    pub responder_id: ResponderId,
    pub class: ResponderClass,
    pub tier: ServiceTier,
    pub position: Option<GeoPoint>,
    pub rating_average: f64,
    pub completed_rides: u32,
    /// Estimated seconds until the unit reaches the pickup point
    pub eta_seconds: Option<u64>,
}

impl ResponderSummary {
    pub fn from_presence(presence: &ResponderPresence, eta_seconds: Option<u64>) -> Self {
        Self {
            responder_id: presence.id,
            class: presence.class,
            tier: presence.tier,
            position: presence.position,
            rating_average: presence.rating_average,
            completed_rides: presence.completed_rides,
            eta_seconds,
        }
    }
}

/// Outbound dispatch events.
///
/// Serialized with a `type` tag carrying the wire event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DispatchEvent {
    #[serde(rename = "request.searching")]
    Searching {
        request_id: RequestId,
        candidate_count: usize,
    },

    /// Sent to each candidate
    #[serde(rename = "request.offer")]
    Offer {
        request_id: RequestId,
        emergency_type: EmergencyType,
        severity: Severity,
        responder_class: ResponderClass,
        pickup: Location,
        distance_meters: f64,
        deadline: DateTime<Utc>,
    },

    #[serde(rename = "request.noResponder")]
    NoResponder { request_id: RequestId },

    /// Sent to the requester
    #[serde(rename = "request.accepted")]
    Accepted {
        request_id: RequestId,
        responder: ResponderSummary,
        suggested_destinations: Vec<HospitalSuggestion>,
    },

    /// Sent to the winning responder
    #[serde(rename = "request.acceptConfirmed")]
    AcceptConfirmed {
        request_id: RequestId,
        requester_id: RequesterId,
        pickup: Location,
        suggested_destinations: Vec<HospitalSuggestion>,
    },

    /// Sent to candidates whose offer is withdrawn
    #[serde(rename = "request.offerTaken")]
    OfferTaken { request_id: RequestId },

    #[serde(rename = "request.rejectConfirmed")]
    RejectConfirmed { request_id: RequestId },

    #[serde(rename = "request.timeout")]
    Timeout { request_id: RequestId },

    #[serde(rename = "request.statusChanged")]
    StatusChanged {
        request_id: RequestId,
        status: RequestStatus,
    },

    #[serde(rename = "request.cancelled")]
    Cancelled { request_id: RequestId, reason: String },

    #[serde(rename = "request.destinationSelected")]
    DestinationSelected {
        request_id: RequestId,
        hospital_id: HospitalId,
        destination: Location,
        route: RouteSummary,
    },

    #[serde(rename = "responder.location")]
    ResponderLocation {
        request_id: RequestId,
        responder_id: ResponderId,
        position: GeoPoint,
    },
}

impl DispatchEvent {
    /// Wire name, identical to the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Searching { .. } => "request.searching",
            Self::Offer { .. } => "request.offer",
            Self::NoResponder { .. } => "request.noResponder",
            Self::Accepted { .. } => "request.accepted",
            Self::AcceptConfirmed { .. } => "request.acceptConfirmed",
            Self::OfferTaken { .. } => "request.offerTaken",
            Self::RejectConfirmed { .. } => "request.rejectConfirmed",
            Self::Timeout { .. } => "request.timeout",
            Self::StatusChanged { .. } => "request.statusChanged",
            Self::Cancelled { .. } => "request.cancelled",
            Self::DestinationSelected { .. } => "request.destinationSelected",
            Self::ResponderLocation { .. } => "responder.location",
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Searching { request_id, .. }
            | Self::Offer { request_id, .. }
            | Self::NoResponder { request_id }
            | Self::Accepted { request_id, .. }
            | Self::AcceptConfirmed { request_id, .. }
            | Self::OfferTaken { request_id }
            | Self::RejectConfirmed { request_id }
            | Self::Timeout { request_id }
            | Self::StatusChanged { request_id, .. }
            | Self::Cancelled { request_id, .. }
            | Self::DestinationSelected { request_id, .. }
            | Self::ResponderLocation { request_id, .. } => *request_id,
        }
    }
}
