//! Authorization for dispatch sessions
//!
//! Provides a fluent API for authorization checks in the session manager:
//!
//! ```rust
//! use dispatch_core::common::{Actor, DispatchCapability, OperatorId, RequesterId, SessionParties};
//!
//! let parties = SessionParties { requester: RequesterId::new(), responder: None };
//!
//! Actor::Operator(OperatorId::new())
//!     .can(DispatchCapability::Cancel)
//!     .on(parties)
//!     .check()
//!     .unwrap();
//! ```
//!
//! "Not authorized" is reported separately from "invalid transition" so a
//! caller can tell a wrong party from a wrong moment.

mod builder;
mod capability;
mod errors;

pub use builder::{Actor, CapabilityBuilder, SessionCheck, SessionParties};
pub use capability::DispatchCapability;
pub use errors::AuthError;
