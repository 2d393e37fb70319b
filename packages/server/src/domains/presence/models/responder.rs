use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{GeoPoint, RequestId, ResponderId};

// ============================================================================
// Enums
// ============================================================================

/// Clinical capability of a responder unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponderClass {
    /// Basic life support
    #[serde(rename = "BLS", alias = "basic", alias = "bls")]
    Bls,
    /// Advanced life support
    #[serde(rename = "ALS", alias = "advanced", alias = "als")]
    Als,
}

impl ResponderClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bls => "BLS",
            Self::Als => "ALS",
        }
    }
}

/// Who operates the unit. Public units are dispatched within the tighter
/// radius; private bookings search wider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    #[default]
    #[serde(alias = "government")]
    Public,
    Private,
}

impl ServiceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    #[default]
    Offline,
    Available,
    OnDuty,
    Maintenance,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Available => "available",
            Self::OnDuty => "on_duty",
            Self::Maintenance => "maintenance",
        }
    }
}

// ============================================================================
// Presence record
// ============================================================================

/// Last known state of one responder unit.
///
/// `status == OnDuty` exactly when `session` is set. Only the presence
/// tracker writes these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderPresence {
    pub id: ResponderId,
    pub class: ResponderClass,
    pub tier: ServiceTier,
    /// Last reported position; consumers must treat it as possibly stale
    pub position: Option<GeoPoint>,
    pub status: AvailabilityStatus,
    pub session: Option<RequestId>,
    pub completed_rides: u32,
    pub rating_average: f64,
    pub rating_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl ResponderPresence {
    pub fn new(
        id: ResponderId,
        class: ResponderClass,
        tier: ServiceTier,
        position: Option<GeoPoint>,
    ) -> Self {
        Self {
            id,
            class,
            tier,
            position,
            status: AvailabilityStatus::Offline,
            session: None,
            completed_rides: 0,
            rating_average: 0.0,
            rating_count: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == AvailabilityStatus::Available
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_accepts_aliases() {
        let basic: ResponderClass = serde_json::from_str("\"basic\"").unwrap();
        let bls: ResponderClass = serde_json::from_str("\"BLS\"").unwrap();
        let advanced: ResponderClass = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(basic, ResponderClass::Bls);
        assert_eq!(bls, ResponderClass::Bls);
        assert_eq!(advanced, ResponderClass::Als);
        assert_eq!(serde_json::to_string(&basic).unwrap(), "\"BLS\"");
    }

    #[test]
    fn test_unknown_class_rejected() {
        assert!(serde_json::from_str::<ResponderClass>("\"helicopter\"").is_err());
    }

    #[test]
    fn test_government_is_public() {
        let tier: ServiceTier = serde_json::from_str("\"government\"").unwrap();
        assert_eq!(tier, ServiceTier::Public);
        assert_eq!(ServiceTier::default(), ServiceTier::Public);
    }

    #[test]
    fn test_new_responder_starts_offline() {
        let r = ResponderPresence::new(
            ResponderId::new(),
            ResponderClass::Als,
            ServiceTier::Private,
            None,
        );
        assert_eq!(r.status, AvailabilityStatus::Offline);
        assert!(!r.is_bound());
        assert_eq!(r.completed_rides, 0);
    }
}
