use serde::{Deserialize, Serialize};

/// One driving route as reported by a route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Encoded polyline, when the provider returns one
    pub encoded_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtaSource {
    Routed,
    StraightLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eta {
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub source: EtaSource,
}

/// Route stored on a request once a destination is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub duration_seconds: u64,
    /// Empty for straight-line fallbacks
    pub encoded_path: String,
    pub source: EtaSource,
}
