use serde::{Deserialize, Serialize};

use crate::common::{GeoPoint, ResponderId};
use crate::domains::presence::models::{ResponderClass, ServiceTier};

/// Radius search for dispatchable responders.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub point: GeoPoint,
    pub radius_meters: f64,
    pub class: ResponderClass,
    pub tier: ServiceTier,
    pub limit: usize,
}

impl CandidateQuery {
    /// Same query over twice the radius.
    pub fn widened(&self) -> Self {
        Self {
            radius_meters: self.radius_meters * 2.0,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub responder_id: ResponderId,
    pub position: GeoPoint,
    /// Straight-line distance to the query point, whole metres
    pub distance_meters: f64,
}
