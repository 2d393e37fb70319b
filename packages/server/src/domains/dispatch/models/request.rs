use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::RequestStatus;
use crate::common::{HospitalId, Location, RequestId, RequesterId, ResponderId, SessionParties};
use crate::domains::presence::models::{ResponderClass, ServiceTier};
use crate::domains::ranking::models::HospitalSuggestion;
use crate::domains::routing::RouteSummary;

// ============================================================================
// Classification enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    RoadAccident,
    HeartAttack,
    Stroke,
    Trauma,
    BreathingDifficulty,
    Seizure,
    Burns,
    Poisoning,
    PregnancyEmergency,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    #[default]
    High,
    Medium,
    Low,
}

// ============================================================================
// Embedded records
// ============================================================================

/// One status the request actually entered, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetrics {
    pub search_start_time: Option<DateTime<Utc>>,
    pub search_end_time: Option<DateTime<Utc>>,
    pub responders_notified: u32,
    pub response_time_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub hospital_id: HospitalId,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRating {
    pub score: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}

// ============================================================================
// EmergencyRequest
// ============================================================================

/// Input for a new request; validated by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct NewEmergencyRequest {
    pub requester_id: RequesterId,
    pub emergency_type: EmergencyType,
    #[builder(default)]
    #[serde(default)]
    pub severity: Severity,
    pub pickup: Location,
    pub responder_class: ResponderClass,
    #[builder(default)]
    #[serde(default)]
    pub service_tier: ServiceTier,
}

/// One dispatch session's durable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: RequestId,
    pub requester_id: RequesterId,
    pub emergency_type: EmergencyType,
    pub severity: Severity,
    pub responder_class: ResponderClass,
    pub service_tier: ServiceTier,
    pub pickup: Location,
    pub destination: Option<Destination>,
    pub status: RequestStatus,
    pub status_history: Vec<StatusChange>,
    /// Set exactly once, never reassigned
    pub assigned_responder: Option<ResponderId>,
    pub metrics: ResponseMetrics,
    pub hospital_suggestions: Vec<HospitalSuggestion>,
    pub route: Option<RouteSummary>,
    pub cancellation_reason: Option<String>,
    pub rating: Option<ServiceRating>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmergencyRequest {
    pub fn new(input: NewEmergencyRequest) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::new(),
            requester_id: input.requester_id,
            emergency_type: input.emergency_type,
            severity: input.severity,
            responder_class: input.responder_class,
            service_tier: input.service_tier,
            pickup: input.pickup,
            destination: None,
            status: RequestStatus::Pending,
            status_history: vec![StatusChange {
                status: RequestStatus::Pending,
                at: now,
            }],
            assigned_responder: None,
            metrics: ResponseMetrics::default(),
            hospital_suggestions: Vec::new(),
            route: None,
            cancellation_reason: None,
            rating: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record entering `status`. Callers validate the move first.
    pub fn enter(&mut self, status: RequestStatus, at: DateTime<Utc>) {
        self.status = status;
        self.status_history.push(StatusChange { status, at });
        self.updated_at = at;
    }

    /// When the request first entered `status`, if it ever did
    pub fn time_of(&self, status: RequestStatus) -> Option<DateTime<Utc>> {
        self.status_history
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.at)
    }

    pub fn accept_time(&self) -> Option<DateTime<Utc>> {
        self.time_of(RequestStatus::Accepted)
    }

    pub fn pickup_time(&self) -> Option<DateTime<Utc>> {
        self.time_of(RequestStatus::PatientPicked)
    }

    pub fn completion_time(&self) -> Option<DateTime<Utc>> {
        self.time_of(RequestStatus::Completed)
    }

    pub fn parties(&self) -> SessionParties {
        SessionParties {
            requester: self.requester_id,
            responder: self.assigned_responder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GeoPoint;

    fn request() -> EmergencyRequest {
        EmergencyRequest::new(
            NewEmergencyRequest::builder()
                .requester_id(RequesterId::new())
                .emergency_type(EmergencyType::Stroke)
                .pickup(Location::new(GeoPoint::new(0.0, 0.0), "Main St"))
                .responder_class(ResponderClass::Als)
                .build(),
        )
    }

    #[test]
    fn test_new_request_defaults() {
        let r = request();
        assert_eq!(r.status, RequestStatus::Pending);
        assert_eq!(r.severity, Severity::High);
        assert_eq!(r.service_tier, ServiceTier::Public);
        assert!(r.assigned_responder.is_none());
        assert_eq!(r.status_history.len(), 1);
    }

    #[test]
    fn test_history_records_each_status() {
        let mut r = request();
        let t1 = Utc::now();
        r.enter(RequestStatus::Searching, t1);
        r.enter(RequestStatus::Accepted, t1);

        assert_eq!(r.status, RequestStatus::Accepted);
        assert_eq!(r.accept_time(), Some(t1));
        assert!(r.pickup_time().is_none());
        let statuses: Vec<_> = r.status_history.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                RequestStatus::Pending,
                RequestStatus::Searching,
                RequestStatus::Accepted
            ]
        );
    }

    #[test]
    fn test_input_defaults_from_json() {
        let json = serde_json::json!({
            "requesterId": RequesterId::new(),
            "emergencyType": "heart_attack",
            "pickup": { "latitude": 1.0, "longitude": 2.0, "address": "x" },
            "responderClass": "basic"
        });
        let input: NewEmergencyRequest = serde_json::from_value(json).unwrap();
        assert_eq!(input.severity, Severity::High);
        assert_eq!(input.service_tier, ServiceTier::Public);
        assert_eq!(input.responder_class, ResponderClass::Bls);
    }

    #[test]
    fn test_unknown_emergency_type_rejected() {
        assert!(serde_json::from_str::<EmergencyType>("\"alien_abduction\"").is_err());
    }
}
