//! Test fixtures for building dispatch scenarios.
//!
//! Everything here runs against the in-memory dependencies from
//! `kernel::test_dependencies`; no containers needed.

use dispatch_core::common::{GeoPoint, Location, RequesterId, ResponderId};
use dispatch_core::domains::dispatch::models::{EmergencyType, NewEmergencyRequest};
use dispatch_core::domains::dispatch::{DispatchEvent, SessionManager};
use dispatch_core::domains::gateway::Topic;
use dispatch_core::domains::presence::{ResponderClass, ServiceTier};
use dispatch_core::domains::ranking::{Hospital, HospitalTier, Specialization};
use dispatch_core::kernel::TestDependencies;
use tokio::sync::broadcast;

/// Session manager over default test dependencies.
pub fn manager() -> SessionManager {
    SessionManager::new(TestDependencies::new().into_deps())
}

pub fn manager_with(deps: TestDependencies) -> SessionManager {
    SessionManager::new(deps.into_deps())
}

/// Register a responder and put it online at (0, `lon`).
pub async fn online_responder(
    manager: &SessionManager,
    class: ResponderClass,
    tier: ServiceTier,
    lon: f64,
) -> ResponderId {
    let record = manager
        .register_responder(None, class, tier, None)
        .await
        .expect("register responder");
    manager
        .set_online(record.id, GeoPoint::new(0.0, lon))
        .await
        .expect("go online");
    record.id
}

pub async fn basic_responder(manager: &SessionManager, lon: f64) -> ResponderId {
    online_responder(manager, ResponderClass::Bls, ServiceTier::Public, lon).await
}

/// Public-tier request at the origin needing a basic unit.
pub fn emergency(requester: RequesterId) -> NewEmergencyRequest {
    emergency_of(requester, EmergencyType::RoadAccident, ResponderClass::Bls)
}

pub fn emergency_of(
    requester: RequesterId,
    emergency_type: EmergencyType,
    class: ResponderClass,
) -> NewEmergencyRequest {
    NewEmergencyRequest::builder()
        .requester_id(requester)
        .emergency_type(emergency_type)
        .pickup(Location::new(GeoPoint::new(0.0, 0.0), "Junction 4, Ring Road"))
        .responder_class(class)
        .build()
}

/// A handful of hospitals around the origin.
pub fn hospitals() -> Vec<Hospital> {
    vec![
        Hospital::builder()
            .name("City Trauma Centre")
            .location(Location::new(GeoPoint::new(0.0, 0.02), "1 Hospital Rd"))
            .tier(HospitalTier::Government)
            .specializations(vec![Specialization::TraumaCenter, Specialization::General])
            .available_units(6u32)
            .icu_beds_available(2u32)
            .rating(4.5)
            .build(),
        Hospital::builder()
            .name("Lakeside General")
            .location(Location::new(GeoPoint::new(0.0, 0.04), "9 Lake St"))
            .tier(HospitalTier::Private)
            .specializations(vec![Specialization::General])
            .available_units(2u32)
            .rating(3.5)
            .build(),
        Hospital::builder()
            .name("Full House Clinic")
            .location(Location::new(GeoPoint::new(0.0, 0.01), "3 Busy Ln"))
            .tier(HospitalTier::Private)
            .specializations(vec![Specialization::TraumaCenter])
            .available_units(0u32)
            .build(),
    ]
}

pub async fn subscribe_responder(
    manager: &SessionManager,
    id: ResponderId,
) -> broadcast::Receiver<DispatchEvent> {
    manager.deps().gateway.subscribe(Topic::Responder(id)).await
}

pub async fn subscribe_requester(
    manager: &SessionManager,
    id: RequesterId,
) -> broadcast::Receiver<DispatchEvent> {
    manager.deps().gateway.subscribe(Topic::Requester(id)).await
}

/// Everything currently buffered on a receiver.
pub fn drain(rx: &mut broadcast::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wire kinds of everything currently buffered.
pub fn drain_kinds(rx: &mut broadcast::Receiver<DispatchEvent>) -> Vec<&'static str> {
    drain(rx).iter().map(DispatchEvent::kind).collect()
}
