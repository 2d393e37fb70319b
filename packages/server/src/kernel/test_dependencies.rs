// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into the session manager for
// tests: route providers that succeed, fail or hang, geo indexes that fail,
// hang or record their queries, and a store whose writes can be switched off.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    BaseDispatchStore, BaseGeoIndex, BaseHospitalDirectory, BaseRouteProvider, DispatchDeps,
    InMemoryDispatchStore, InMemoryHospitalDirectory,
};
use crate::common::{GeoPoint, RequestId};
use crate::config::DispatchConfig;
use crate::domains::dispatch::models::{EmergencyRequest, OfferBroadcast};
use crate::domains::gateway::EventGateway;
use crate::domains::geo_index::{Candidate, CandidateQuery, PresenceGeoIndex};
use crate::domains::presence::models::ResponderPresence;
use crate::domains::presence::PresenceTracker;
use crate::domains::ranking::models::Hospital;
use crate::domains::routing::RouteLeg;

// =============================================================================
// Mock Route Providers
// =============================================================================

/// Returns the same leg for every route.
pub struct FixedRouteProvider {
    leg: RouteLeg,
    calls: Arc<Mutex<Vec<(GeoPoint, GeoPoint)>>>,
}

impl FixedRouteProvider {
    pub fn new(distance_meters: f64, duration_seconds: f64, encoded_path: Option<&str>) -> Self {
        Self {
            leg: RouteLeg {
                distance_meters,
                duration_seconds,
                encoded_path: encoded_path.map(str::to_string),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseRouteProvider for FixedRouteProvider {
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteLeg> {
        self.calls.lock().unwrap().push((origin, destination));
        Ok(self.leg.clone())
    }
}

pub struct FailingRouteProvider;

#[async_trait]
impl BaseRouteProvider for FailingRouteProvider {
    async fn route(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<RouteLeg> {
        anyhow::bail!("route provider unavailable")
    }
}

/// Never answers; callers must time out.
pub struct HangingRouteProvider;

#[async_trait]
impl BaseRouteProvider for HangingRouteProvider {
    async fn route(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<RouteLeg> {
        std::future::pending().await
    }
}

// =============================================================================
// Mock Geo Indexes
// =============================================================================

pub struct FailingGeoIndex;

#[async_trait]
impl BaseGeoIndex for FailingGeoIndex {
    async fn find_candidates(&self, _query: &CandidateQuery) -> Result<Vec<Candidate>> {
        anyhow::bail!("geo index unavailable")
    }
}

pub struct HangingGeoIndex;

#[async_trait]
impl BaseGeoIndex for HangingGeoIndex {
    async fn find_candidates(&self, _query: &CandidateQuery) -> Result<Vec<Candidate>> {
        std::future::pending().await
    }
}

/// Delegates to an inner index and records every query radius.
pub struct RecordingGeoIndex {
    inner: Arc<dyn BaseGeoIndex>,
    radii: Arc<Mutex<Vec<f64>>>,
}

impl RecordingGeoIndex {
    pub fn new(inner: Arc<dyn BaseGeoIndex>) -> Self {
        Self {
            inner,
            radii: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn radii(&self) -> Vec<f64> {
        self.radii.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseGeoIndex for RecordingGeoIndex {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        self.radii.lock().unwrap().push(query.radius_meters);
        self.inner.find_candidates(query).await
    }
}

// =============================================================================
// Mock Store
// =============================================================================

/// In-memory store that counts writes and can be told to fail them.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryDispatchStore,
    fail_writes: AtomicBool,
    request_writes: Mutex<Vec<RequestId>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn offer_count(&self) -> usize {
        self.inner.offer_count()
    }

    pub fn request_writes(&self) -> Vec<RequestId> {
        self.request_writes.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("store write refused");
        }
        Ok(())
    }
}

#[async_trait]
impl BaseDispatchStore for RecordingStore {
    async fn save_request(&self, request: &EmergencyRequest) -> Result<()> {
        self.check_writable()?;
        self.request_writes.lock().unwrap().push(request.id);
        self.inner.save_request(request).await
    }

    async fn load_request(&self, id: RequestId) -> Result<Option<EmergencyRequest>> {
        self.inner.load_request(id).await
    }

    async fn load_searching_requests(&self) -> Result<Vec<EmergencyRequest>> {
        self.inner.load_searching_requests().await
    }

    async fn save_offer(&self, offer: &OfferBroadcast) -> Result<()> {
        self.check_writable()?;
        self.inner.save_offer(offer).await
    }

    async fn load_offer(&self, request_id: RequestId) -> Result<Option<OfferBroadcast>> {
        self.inner.load_offer(request_id).await
    }

    async fn delete_offer(&self, request_id: RequestId) -> Result<()> {
        self.check_writable()?;
        self.inner.delete_offer(request_id).await
    }

    async fn save_responder(&self, responder: &ResponderPresence) -> Result<()> {
        self.check_writable()?;
        self.inner.save_responder(responder).await
    }

    async fn load_responders(&self) -> Result<Vec<ResponderPresence>> {
        self.inner.load_responders().await
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<RecordingStore>,
    pub presence: Arc<PresenceTracker>,
    pub geo_index: Option<Arc<dyn BaseGeoIndex>>,
    pub route_provider: Option<Arc<dyn BaseRouteProvider>>,
    pub hospitals: Arc<dyn BaseHospitalDirectory>,
    pub gateway: EventGateway,
    pub config: DispatchConfig,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RecordingStore::new()),
            presence: Arc::new(PresenceTracker::new()),
            geo_index: None,
            route_provider: None,
            hospitals: Arc::new(InMemoryHospitalDirectory::new(Vec::new())),
            gateway: EventGateway::default(),
            config: DispatchConfig::default(),
        }
    }

    /// Replace the presence-backed geo index
    pub fn mock_geo_index(mut self, index: Arc<dyn BaseGeoIndex>) -> Self {
        self.geo_index = Some(index);
        self
    }

    pub fn mock_routes(mut self, provider: Arc<dyn BaseRouteProvider>) -> Self {
        self.route_provider = Some(provider);
        self
    }

    pub fn hospitals(mut self, hospitals: Vec<Hospital>) -> Self {
        self.hospitals = Arc::new(InMemoryHospitalDirectory::new(hospitals));
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Convert into DispatchDeps for testing
    pub fn into_deps(self) -> DispatchDeps {
        let geo_index = self
            .geo_index
            .unwrap_or_else(|| Arc::new(PresenceGeoIndex::new(self.presence.clone())));

        DispatchDeps::new(
            self.store,
            geo_index,
            self.route_provider,
            self.hospitals,
            self.presence,
            self.gateway,
            self.config,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
