// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (ranking, fallbacks, the state machine) lives in the domains
// and only talks to the outside world through these.
//
// Naming convention: Base* for trait names (e.g., BaseGeoIndex, BaseDispatchStore)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{GeoPoint, HospitalId, RequestId};
use crate::domains::dispatch::models::{EmergencyRequest, OfferBroadcast};
use crate::domains::geo_index::{Candidate, CandidateQuery};
use crate::domains::presence::models::ResponderPresence;
use crate::domains::ranking::models::{Hospital, NearbyHospital};
use crate::domains::routing::RouteLeg;

// =============================================================================
// Geo Index Trait (Infrastructure - spatial candidate lookup)
// =============================================================================

#[async_trait]
pub trait BaseGeoIndex: Send + Sync {
    /// Available responders matching the query, nearest first, at most
    /// `query.limit`. An empty list is a normal answer.
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>>;
}

// =============================================================================
// Route Provider Trait (Infrastructure - external routing API)
// =============================================================================

#[async_trait]
pub trait BaseRouteProvider: Send + Sync {
    /// Driving route between two points
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteLeg>;
}

// =============================================================================
// Hospital Directory Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseHospitalDirectory: Send + Sync {
    /// Hospitals within `radius_meters`, nearest first
    async fn hospitals_within(&self, point: GeoPoint, radius_meters: f64) -> Result<Vec<NearbyHospital>>;

    async fn find(&self, id: HospitalId) -> Result<Option<Hospital>>;
}

// =============================================================================
// Dispatch Store Trait (Infrastructure - persistence)
// =============================================================================

#[async_trait]
pub trait BaseDispatchStore: Send + Sync {
    /// Insert or replace the request record
    async fn save_request(&self, request: &EmergencyRequest) -> Result<()>;

    async fn load_request(&self, id: RequestId) -> Result<Option<EmergencyRequest>>;

    /// Every request whose last persisted status is `searching`
    async fn load_searching_requests(&self) -> Result<Vec<EmergencyRequest>>;

    /// Insert or replace the open offer for its request
    async fn save_offer(&self, offer: &OfferBroadcast) -> Result<()>;

    async fn load_offer(&self, request_id: RequestId) -> Result<Option<OfferBroadcast>>;

    /// Drop the offer once the request resolved. Missing offers are not an error.
    async fn delete_offer(&self, request_id: RequestId) -> Result<()>;

    /// Insert or replace the responder's presence record
    async fn save_responder(&self, responder: &ResponderPresence) -> Result<()>;

    async fn load_responders(&self) -> Result<Vec<ResponderPresence>>;
}
