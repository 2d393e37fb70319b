use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::models::{Eta, EtaSource, RouteLeg, RouteSummary};
use crate::common::utils::distance_between;
use crate::common::GeoPoint;
use crate::kernel::BaseRouteProvider;

/// Distance/ETA estimator.
///
/// Tries the route provider first (bounded by `timeout`) and falls back to
/// the straight-line estimate on any failure. Never returns an error.
#[derive(Clone)]
pub struct EtaEstimator {
    provider: Option<Arc<dyn BaseRouteProvider>>,
    average_speed_mps: f64,
    timeout: Duration,
}

impl EtaEstimator {
    pub fn new(
        provider: Option<Arc<dyn BaseRouteProvider>>,
        average_speed_mps: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            average_speed_mps,
            timeout,
        }
    }

    /// Estimator with no route provider configured
    pub fn straight_line(average_speed_mps: f64) -> Self {
        Self::new(None, average_speed_mps, Duration::from_secs(10))
    }

    pub async fn estimate_eta(&self, origin: GeoPoint, destination: GeoPoint) -> Eta {
        match self.routed(origin, destination).await {
            Some(leg) => Eta {
                distance_meters: leg.distance_meters,
                duration_seconds: leg.duration_seconds.ceil() as u64,
                source: EtaSource::Routed,
            },
            None => self.fallback(origin, destination),
        }
    }

    pub async fn route_summary(&self, origin: GeoPoint, destination: GeoPoint) -> RouteSummary {
        match self.routed(origin, destination).await {
            Some(leg) => RouteSummary {
                distance_meters: leg.distance_meters,
                duration_seconds: leg.duration_seconds.ceil() as u64,
                encoded_path: leg.encoded_path.unwrap_or_default(),
                source: EtaSource::Routed,
            },
            None => {
                let eta = self.fallback(origin, destination);
                RouteSummary {
                    distance_meters: eta.distance_meters,
                    duration_seconds: eta.duration_seconds,
                    encoded_path: String::new(),
                    source: EtaSource::StraightLine,
                }
            }
        }
    }

    fn fallback(&self, origin: GeoPoint, destination: GeoPoint) -> Eta {
        let distance = distance_between(&origin, &destination);
        Eta {
            distance_meters: distance,
            duration_seconds: fallback_duration_seconds(distance, self.average_speed_mps),
            source: EtaSource::StraightLine,
        }
    }

    async fn routed(&self, origin: GeoPoint, destination: GeoPoint) -> Option<RouteLeg> {
        let provider = self.provider.as_ref()?;

        match tokio::time::timeout(self.timeout, provider.route(origin, destination)).await {
            Ok(Ok(leg)) => {
                debug!(distance = leg.distance_meters, duration = leg.duration_seconds, "routed eta");
                Some(leg)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "route provider failed, using straight-line estimate");
                None
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "route provider timed out, using straight-line estimate");
                None
            }
        }
    }
}

/// Straight-line travel time in whole seconds, rounded up.
pub fn fallback_duration_seconds(distance_meters: f64, average_speed_mps: f64) -> u64 {
    if distance_meters <= 0.0 || average_speed_mps <= 0.0 {
        return 0;
    }
    (distance_meters / average_speed_mps).ceil() as u64
}
