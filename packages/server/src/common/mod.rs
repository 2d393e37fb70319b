// Common types and utilities shared across the application

pub mod auth;
pub mod entity_ids;
pub mod id;
pub mod types;
pub mod utils;

pub use auth::{Actor, AuthError, DispatchCapability, SessionParties};
pub use entity_ids::*;
pub use id::{Id, V4, V7};
pub use types::*;
