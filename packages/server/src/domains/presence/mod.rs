pub mod models;
pub mod tracker;

pub use models::{AvailabilityStatus, ResponderClass, ResponderPresence, ServiceTier};
pub use tracker::{PresenceError, PresenceTracker};
