pub mod estimator;
pub mod models;

pub use estimator::{fallback_duration_seconds, EtaEstimator};
pub use models::{Eta, EtaSource, RouteLeg, RouteSummary};
