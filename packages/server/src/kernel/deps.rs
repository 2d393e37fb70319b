//! Dispatch dependencies (using traits for testability)
//!
//! Central container handed to the session manager. Every external service
//! sits behind a Base* trait so tests can swap in mocks.

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::domains::gateway::EventGateway;
use crate::domains::presence::PresenceTracker;
use crate::domains::ranking::HospitalRecommender;
use crate::domains::routing::EtaEstimator;
use crate::kernel::{BaseDispatchStore, BaseGeoIndex, BaseHospitalDirectory, BaseRouteProvider};

#[derive(Clone)]
pub struct DispatchDeps {
    pub store: Arc<dyn BaseDispatchStore>,
    pub geo_index: Arc<dyn BaseGeoIndex>,
    /// `None` when no routing API key is configured
    pub route_provider: Option<Arc<dyn BaseRouteProvider>>,
    pub hospitals: Arc<dyn BaseHospitalDirectory>,
    pub presence: Arc<PresenceTracker>,
    /// Topic registry shared with the SSE endpoints
    pub gateway: EventGateway,
    pub config: DispatchConfig,
}

impl DispatchDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn BaseDispatchStore>,
        geo_index: Arc<dyn BaseGeoIndex>,
        route_provider: Option<Arc<dyn BaseRouteProvider>>,
        hospitals: Arc<dyn BaseHospitalDirectory>,
        presence: Arc<PresenceTracker>,
        gateway: EventGateway,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            geo_index,
            route_provider,
            hospitals,
            presence,
            gateway,
            config,
        }
    }

    pub fn estimator(&self) -> EtaEstimator {
        EtaEstimator::new(
            self.route_provider.clone(),
            self.config.average_speed_mps,
            self.config.dependency_timeout,
        )
    }

    pub fn recommender(&self) -> HospitalRecommender {
        HospitalRecommender::new(
            self.hospitals.clone(),
            self.estimator(),
            self.config.max_hospital_suggestions,
            self.config.dependency_timeout,
        )
    }
}
