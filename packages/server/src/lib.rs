// Rapid Response Dispatch - matching engine core
//
// Matches emergency requests to the nearest available ambulance, resolves the
// accept race, drives each ride through its lifecycle and recommends
// destination hospitals. Architecture follows domain-driven design: pure
// rules in domains/*/machines and utils, side effects in domains/*/effects,
// infrastructure behind Base* traits in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
