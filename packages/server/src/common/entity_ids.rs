//! Typed ID definitions for dispatch entities.
//!
//! Requesters and operators are external identities; the engine only stores
//! and compares their ids.

pub use super::id::{Id, V4, V7};

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for the person who raised an emergency request.
pub struct Requester;

/// Marker type for a responder unit (ambulance).
pub struct Responder;

/// Marker type for a dispatch operator / admin.
pub struct Operator;

/// Marker type for emergency requests (dispatch sessions).
pub struct EmergencyRequest;

/// Marker type for hospitals known to the recommendation service.
pub struct Hospital;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type RequesterId = Id<Requester>;

pub type ResponderId = Id<Responder>;

pub type OperatorId = Id<Operator>;

pub type RequestId = Id<EmergencyRequest>;

pub type HospitalId = Id<Hospital>;
