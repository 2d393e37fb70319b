//! Dispatch session manager.
//!
//! Owns every live [`EmergencyRequest`] and drives it through the lifecycle.
//! Each request has its own `tokio::sync::Mutex`; every transition for that
//! request runs while holding it, so checks and writes never interleave.
//! Binding a responder additionally goes through the presence tracker's
//! compare-and-set, which gives the at-most-one-winner guarantee for both
//! sides of the race (two accepts for one request, one responder accepting
//! two requests).
//!
//! Caller-driven transitions persist a modified copy first and only swap it
//! in once the store accepted it, so a failed write leaves the session as it
//! was. System-driven transitions (no candidates, offer expiry) are applied
//! in memory and persisted best-effort.
//!
//! Only live requests stay in memory. A session is evicted when its lock is
//! released on a terminal request whose state the store holds; later reads
//! load it back on demand.

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

use super::deadlines::OfferDeadlines;
use crate::common::{Actor, DispatchCapability, GeoPoint, HospitalId, RequestId, ResponderId};
use crate::domains::dispatch::commands::{InboundMessage, InboundReply};
use crate::domains::dispatch::errors::{DispatchError, DispatchResult};
use crate::domains::dispatch::events::{DispatchEvent, ResponderSummary};
use crate::domains::dispatch::machines::{
    check_advance, check_bind, check_cancel, check_exhausted, destination_selectable,
};
use crate::domains::dispatch::models::{
    Destination, EmergencyRequest, NewEmergencyRequest, OfferBroadcast, RequestStatus,
    ServiceRating,
};
use crate::domains::geo_index::{Candidate, CandidateQuery};
use crate::domains::presence::models::{ResponderClass, ResponderPresence, ServiceTier};
use crate::domains::ranking::HospitalRecommender;
use crate::domains::routing::{EtaEstimator, RouteSummary};
use crate::kernel::DispatchDeps;

const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

struct Session {
    request: EmergencyRequest,
    /// Open while searching, dropped on any resolution
    offer: Option<OfferBroadcast>,
    /// False while a best-effort write of `request` is outstanding
    stored: bool,
}

impl Session {
    fn loaded(request: EmergencyRequest, offer: Option<OfferBroadcast>) -> Self {
        Self {
            request,
            offer,
            stored: true,
        }
    }

    /// Swap in a record the store already accepted.
    fn commit(&mut self, request: EmergencyRequest) {
        self.request = request;
        self.stored = true;
    }
}

type SessionHandle = Arc<Mutex<Session>>;

/// Exclusive access to one session.
///
/// Dropping it evicts the session from the live map once the request is
/// terminal and stored.
struct SessionLock {
    guard: OwnedMutexGuard<Session>,
    handle: SessionHandle,
    sessions: Arc<DashMap<RequestId, SessionHandle>>,
}

impl Deref for SessionLock {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.guard
    }
}

impl DerefMut for SessionLock {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.guard
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if self.guard.stored && self.guard.request.status.is_terminal() {
            let request_id = self.guard.request.id;
            let evicted = self
                .sessions
                .remove_if(&request_id, |_, live| Arc::ptr_eq(live, &self.handle));
            if evicted.is_some() {
                debug!(request_id = %request_id, status = %self.guard.request.status, "session evicted");
            }
        }
    }
}

/// What [`SessionManager::restore`] brought back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub responders: usize,
    /// Searching requests whose deadline was re-armed
    pub searching: usize,
}

#[derive(Clone)]
pub struct SessionManager {
    deps: DispatchDeps,
    estimator: EtaEstimator,
    recommender: HospitalRecommender,
    sessions: Arc<DashMap<RequestId, SessionHandle>>,
    deadlines: OfferDeadlines,
}

impl SessionManager {
    pub fn new(deps: DispatchDeps) -> Self {
        Self {
            estimator: deps.estimator(),
            recommender: deps.recommender(),
            deps,
            sessions: Arc::new(DashMap::new()),
            deadlines: OfferDeadlines::new(),
        }
    }

    pub fn deps(&self) -> &DispatchDeps {
        &self.deps
    }

    /// Requests currently held in memory
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Create a request and run the responder search.
    ///
    /// Returns the request as it stands after the search: `Searching` with an
    /// armed offer deadline, or `NoResponderAvailable`.
    #[instrument(skip_all, fields(requester_id = %input.requester_id, emergency_type = ?input.emergency_type))]
    pub async fn create_request(&self, input: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
        input.pickup.point.validate()?;

        let started = Utc::now();
        let mut request = EmergencyRequest::new(input);
        request.enter(RequestStatus::Searching, started);
        request.metrics.search_start_time = Some(started);
        self.persist(&request).await?;

        let request_id = request.id;
        let requester_id = request.requester_id;
        let handle: SessionHandle = Arc::new(Mutex::new(Session::loaded(request, None)));
        let mut guard = self.lock_handle(handle.clone()).await;
        self.sessions.insert(request_id, handle);
        info!(request_id = %request_id, "request created, searching");

        let candidates = self.find_candidates(&guard.request).await;

        if candidates.is_empty() {
            check_exhausted(guard.request.status)?;
            let at = Utc::now();
            guard.request.enter(RequestStatus::NoResponderAvailable, at);
            guard.request.metrics.search_end_time = Some(at);
            guard.stored = self.persist_best_effort(&guard.request).await;
            let snapshot = guard.request.clone();
            drop(guard);

            info!(request_id = %request_id, "no responder available");
            self.deps
                .gateway
                .notify_requester(requester_id, DispatchEvent::NoResponder { request_id })
                .await;
            return Ok(snapshot);
        }

        let timeout = self.deps.config.offer_timeout;
        let offer = OfferBroadcast {
            request_id,
            deadline: Utc::now() + chrono::Duration::seconds(timeout.as_secs() as i64),
            candidates,
        };
        let candidate_count = offer.candidates.len();
        guard.request.metrics.responders_notified = candidate_count as u32;
        guard.request.updated_at = Utc::now();
        guard.stored = self.persist_best_effort(&guard.request).await;
        if let Err(e) = self.bounded(self.deps.store.save_offer(&offer)).await {
            warn!(request_id = %request_id, error = %e, "failed to persist offer");
        }

        self.deps.gateway.broadcast_offer(&guard.request, &offer).await;
        self.deps
            .gateway
            .notify_requester(
                requester_id,
                DispatchEvent::Searching {
                    request_id,
                    candidate_count,
                },
            )
            .await;
        guard.offer = Some(offer);
        self.arm_deadline(request_id, timeout).await;

        info!(request_id = %request_id, candidate_count, "offer broadcast");
        Ok(guard.request.clone())
    }

    /// First accept wins; everyone after gets `AlreadyTaken`.
    #[instrument(skip_all, fields(request_id = %request_id, responder_id = %responder_id))]
    pub async fn accept_offer(
        &self,
        request_id: RequestId,
        responder_id: ResponderId,
    ) -> DispatchResult<EmergencyRequest> {
        let mut guard = self.lock_session(request_id).await?;

        if guard.request.status != RequestStatus::Searching {
            debug!(status = %guard.request.status, "accept arrived after resolution");
            return Err(DispatchError::AlreadyTaken(request_id));
        }
        let offered = guard
            .offer
            .as_ref()
            .is_some_and(|offer| offer.includes(responder_id));
        if !offered {
            return Err(DispatchError::not_authorized(
                "responder was not offered this request",
            ));
        }

        self.bind(&mut guard, responder_id).await?;
        let losers = self
            .close_offer(&mut guard)
            .await
            .map(|o| o.losers(responder_id))
            .unwrap_or_default();
        Ok(self.announce_binding(&mut guard, losers).await)
    }

    /// Acknowledge a declined offer. The request is untouched.
    #[instrument(skip_all, fields(request_id = %request_id, responder_id = %responder_id))]
    pub async fn reject_offer(
        &self,
        request_id: RequestId,
        responder_id: ResponderId,
        reason: Option<String>,
    ) -> DispatchResult<()> {
        {
            let guard = self.lock_session(request_id).await?;
            if guard.request.status != RequestStatus::Searching {
                return Err(DispatchError::AlreadyTaken(request_id));
            }
            let offered = guard
                .offer
                .as_ref()
                .is_some_and(|offer| offer.includes(responder_id));
            if !offered {
                return Err(DispatchError::not_authorized(
                    "responder was not offered this request",
                ));
            }
        }

        info!(reason = reason.as_deref().unwrap_or("none given"), "offer rejected");
        self.deps
            .gateway
            .notify_responder(responder_id, DispatchEvent::RejectConfirmed { request_id })
            .await;
        Ok(())
    }

    /// Operator binds a specific responder, bypassing the offer.
    #[instrument(skip_all, fields(request_id = %request_id, responder_id = %responder_id))]
    pub async fn assign_responder(
        &self,
        request_id: RequestId,
        actor: Actor,
        responder_id: ResponderId,
    ) -> DispatchResult<EmergencyRequest> {
        let mut guard = self.lock_session(request_id).await?;

        actor
            .can(DispatchCapability::AssignResponder)
            .on(guard.request.parties())
            .check()?;

        self.bind(&mut guard, responder_id).await?;
        let losers = self
            .close_offer(&mut guard)
            .await
            .map(|o| o.losers(responder_id))
            .unwrap_or_default();
        Ok(self.announce_binding(&mut guard, losers).await)
    }

    /// Move the ride one step forward.
    #[instrument(skip_all, fields(request_id = %request_id, target = %target))]
    pub async fn advance_status(
        &self,
        request_id: RequestId,
        actor: Actor,
        target: RequestStatus,
    ) -> DispatchResult<EmergencyRequest> {
        let mut guard = self.lock_session(request_id).await?;

        actor
            .can(DispatchCapability::AdvanceStatus)
            .on(guard.request.parties())
            .check()?;
        check_advance(guard.request.status, target)?;

        let mut next = guard.request.clone();
        next.enter(target, Utc::now());
        self.persist(&next).await?;

        let responder = next.assigned_responder;
        if target == RequestStatus::Completed {
            if let Some(responder_id) = responder {
                self.deps.presence.finish_ride(responder_id);
                self.sync_responder(responder_id).await;
            }
        }

        guard.commit(next);
        let snapshot = guard.request.clone();
        drop(guard);

        info!(status = %target, "status advanced");
        let event = DispatchEvent::StatusChanged {
            request_id,
            status: target,
        };
        if let Some(responder_id) = responder {
            self.deps
                .gateway
                .notify_responder(responder_id, event.clone())
                .await;
        }
        self.deps
            .gateway
            .notify_requester(snapshot.requester_id, event)
            .await;
        Ok(snapshot)
    }

    #[instrument(skip_all, fields(request_id = %request_id))]
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
        actor: Actor,
        reason: Option<String>,
    ) -> DispatchResult<EmergencyRequest> {
        let mut guard = self.lock_session(request_id).await?;

        actor
            .can(DispatchCapability::Cancel)
            .on(guard.request.parties())
            .check()?;
        check_cancel(guard.request.status)?;

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

        let was_bound = guard.request.status.has_responder();
        let mut next = guard.request.clone();
        next.enter(RequestStatus::Cancelled, Utc::now());
        next.cancellation_reason = Some(reason.clone());
        self.persist(&next).await?;

        let bound = next.assigned_responder.filter(|_| was_bound);
        if let Some(responder_id) = bound {
            self.deps.presence.unbind(responder_id);
            self.sync_responder(responder_id).await;
        }
        let offer = self.close_offer(&mut guard).await;

        guard.commit(next);
        let snapshot = guard.request.clone();
        drop(guard);

        info!(reason = %reason, "request cancelled");
        let event = DispatchEvent::Cancelled { request_id, reason };
        if let Some(responder_id) = bound {
            self.deps
                .gateway
                .notify_responder(responder_id, event.clone())
                .await;
        }
        if let Some(offer) = offer {
            self.deps
                .gateway
                .notify_responders(offer.notified(), DispatchEvent::OfferTaken { request_id })
                .await;
        }
        self.deps
            .gateway
            .notify_requester(snapshot.requester_id, event)
            .await;
        Ok(snapshot)
    }

    /// Pick the destination hospital and compute the pickup-to-hospital route.
    #[instrument(skip_all, fields(request_id = %request_id, hospital_id = %hospital_id))]
    pub async fn select_destination(
        &self,
        request_id: RequestId,
        actor: Actor,
        hospital_id: HospitalId,
    ) -> DispatchResult<RouteSummary> {
        // Route lookup happens without the lock held; state is checked again
        // before the write.
        let pickup = {
            let guard = self.lock_session(request_id).await?;
            actor
                .can(DispatchCapability::SelectDestination)
                .on(guard.request.parties())
                .check()?;
            ensure_destination_selectable(&guard.request)?;
            guard.request.pickup.point
        };

        let hospital = self
            .bounded(self.deps.hospitals.find(hospital_id))
            .await?
            .ok_or(DispatchError::HospitalNotFound(hospital_id))?;
        let route = self
            .estimator
            .route_summary(pickup, hospital.location.point)
            .await;

        let mut guard = self.lock_session(request_id).await?;
        ensure_destination_selectable(&guard.request)?;

        let mut next = guard.request.clone();
        next.destination = Some(Destination {
            hospital_id,
            location: hospital.location.clone(),
        });
        next.route = Some(route.clone());
        next.updated_at = Utc::now();
        self.persist(&next).await?;

        guard.commit(next);
        let requester_id = guard.request.requester_id;
        let responder = guard.request.assigned_responder;
        drop(guard);

        info!(
            distance_meters = route.distance_meters,
            duration_seconds = route.duration_seconds,
            source = ?route.source,
            "destination selected"
        );
        let event = DispatchEvent::DestinationSelected {
            request_id,
            hospital_id,
            destination: hospital.location,
            route: route.clone(),
        };
        if let Some(responder_id) = responder {
            self.deps
                .gateway
                .notify_responder(responder_id, event.clone())
                .await;
        }
        self.deps.gateway.notify_requester(requester_id, event).await;
        Ok(route)
    }

    /// Requester rates a completed ride, once.
    #[instrument(skip_all, fields(request_id = %request_id, score = score))]
    pub async fn rate_service(
        &self,
        request_id: RequestId,
        actor: Actor,
        score: u8,
        comment: Option<String>,
    ) -> DispatchResult<EmergencyRequest> {
        if !(1..=5).contains(&score) {
            return Err(DispatchError::validation("rating must be between 1 and 5"));
        }

        let mut guard = self.lock_session(request_id).await?;

        actor
            .can(DispatchCapability::Rate)
            .on(guard.request.parties())
            .check()?;
        if guard.request.status != RequestStatus::Completed {
            return Err(DispatchError::validation(
                "only completed requests can be rated",
            ));
        }
        if guard.request.rating.is_some() {
            return Err(DispatchError::AlreadyRated(request_id));
        }

        let mut next = guard.request.clone();
        next.rating = Some(ServiceRating {
            score,
            comment: comment.filter(|c| !c.trim().is_empty()),
            rated_at: Utc::now(),
        });
        next.updated_at = Utc::now();
        self.persist(&next).await?;

        if let Some(responder_id) = next.assigned_responder {
            self.deps.presence.record_rating(responder_id, score);
            self.sync_responder(responder_id).await;
        }
        guard.commit(next);

        info!("service rated");
        Ok(guard.request.clone())
    }

    pub async fn get_request(&self, request_id: RequestId) -> DispatchResult<EmergencyRequest> {
        let guard = self.lock_session(request_id).await?;
        Ok(guard.request.clone())
    }

    // =========================================================================
    // Responders
    // =========================================================================

    #[instrument(skip_all, fields(class = class.as_str(), tier = tier.as_str()))]
    pub async fn register_responder(
        &self,
        responder_id: Option<ResponderId>,
        class: ResponderClass,
        tier: ServiceTier,
        position: Option<GeoPoint>,
    ) -> DispatchResult<ResponderPresence> {
        if let Some(point) = position {
            point.validate()?;
        }
        let record = self.deps.presence.register(
            responder_id.unwrap_or_default(),
            class,
            tier,
            position,
        )?;
        self.sync_responder(record.id).await;
        Ok(record)
    }

    #[instrument(skip_all, fields(responder_id = %responder_id))]
    pub async fn set_online(
        &self,
        responder_id: ResponderId,
        position: GeoPoint,
    ) -> DispatchResult<ResponderPresence> {
        position.validate()?;
        let record = self.deps.presence.set_available(responder_id, position)?;
        self.sync_responder(responder_id).await;
        info!("responder available");
        Ok(record)
    }

    #[instrument(skip_all, fields(responder_id = %responder_id))]
    pub async fn set_offline(&self, responder_id: ResponderId) -> DispatchResult<ResponderPresence> {
        let record = self.deps.presence.set_offline(responder_id)?;
        self.sync_responder(responder_id).await;
        info!("responder offline");
        Ok(record)
    }

    #[instrument(skip_all, fields(responder_id = %responder_id))]
    pub async fn set_maintenance(
        &self,
        responder_id: ResponderId,
    ) -> DispatchResult<ResponderPresence> {
        let record = self.deps.presence.set_maintenance(responder_id)?;
        self.sync_responder(responder_id).await;
        info!("responder in maintenance");
        Ok(record)
    }

    /// Position pings are not written through to the store.
    pub async fn update_position(
        &self,
        responder_id: ResponderId,
        position: GeoPoint,
    ) -> DispatchResult<ResponderPresence> {
        position.validate()?;
        let record = self.deps.presence.update_position(responder_id, position)?;

        if let Some(request_id) = record.session {
            self.deps
                .gateway
                .publish_tracking(
                    request_id,
                    DispatchEvent::ResponderLocation {
                        request_id,
                        responder_id,
                        position,
                    },
                )
                .await;
        }
        Ok(record)
    }

    pub fn get_responder(&self, responder_id: ResponderId) -> DispatchResult<ResponderPresence> {
        self.deps
            .presence
            .get(responder_id)
            .ok_or(DispatchError::ResponderNotFound(responder_id))
    }

    // =========================================================================
    // Inbound dispatch, startup, shutdown
    // =========================================================================

    /// Route one decoded inbound message to its handler.
    #[instrument(skip_all, fields(kind = message.kind()))]
    pub async fn handle(&self, message: InboundMessage) -> DispatchResult<InboundReply> {
        let reply = match message {
            InboundMessage::CreateRequest(input) => {
                InboundReply::Request(Box::new(self.create_request(input).await?))
            }
            InboundMessage::Accept {
                request_id,
                responder_id,
            } => InboundReply::Request(Box::new(self.accept_offer(request_id, responder_id).await?)),
            InboundMessage::Reject {
                request_id,
                responder_id,
                reason,
            } => {
                self.reject_offer(request_id, responder_id, reason).await?;
                InboundReply::Acknowledged { request_id }
            }
            InboundMessage::Cancel {
                request_id,
                actor,
                reason,
            } => InboundReply::Request(Box::new(
                self.cancel_request(request_id, actor, reason).await?,
            )),
            InboundMessage::AdvanceStatus {
                request_id,
                actor,
                target,
            } => InboundReply::Request(Box::new(
                self.advance_status(request_id, actor, target).await?,
            )),
            InboundMessage::SelectDestination {
                request_id,
                actor,
                hospital_id,
            } => InboundReply::Route(self.select_destination(request_id, actor, hospital_id).await?),
            InboundMessage::AssignResponder {
                request_id,
                actor,
                responder_id,
            } => InboundReply::Request(Box::new(
                self.assign_responder(request_id, actor, responder_id).await?,
            )),
            InboundMessage::Rate {
                request_id,
                actor,
                score,
                comment,
            } => InboundReply::Request(Box::new(
                self.rate_service(request_id, actor, score, comment).await?,
            )),
            InboundMessage::LocationUpdate {
                responder_id,
                position,
            } => InboundReply::Responder(Box::new(self.update_position(responder_id, position).await?)),
            InboundMessage::GoOnline {
                responder_id,
                position,
            } => InboundReply::Responder(Box::new(self.set_online(responder_id, position).await?)),
            InboundMessage::GoOffline { responder_id } => {
                InboundReply::Responder(Box::new(self.set_offline(responder_id).await?))
            }
        };
        Ok(reply)
    }

    /// Load persisted responders and resume every search that was still open.
    ///
    /// A resumed search keeps its original deadline; one that passed while
    /// the process was down expires straight away.
    pub async fn restore(&self) -> DispatchResult<RestoreSummary> {
        let records = self.bounded(self.deps.store.load_responders()).await?;
        let responders = records.len();
        self.deps.presence.restore(records);

        let searching = self
            .bounded(self.deps.store.load_searching_requests())
            .await?;
        let mut resumed = 0;
        for request in searching {
            if !self.sessions.contains_key(&request.id) {
                self.adopt(request).await;
                resumed += 1;
            }
        }

        info!(responders, searching = resumed, "dispatch state restored");
        Ok(RestoreSummary {
            responders,
            searching: resumed,
        })
    }

    /// Cancel every pending offer deadline.
    pub async fn shutdown(&self) {
        let disarmed = self.deadlines.disarm_all().await;
        info!(disarmed, "session manager stopped");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn session(&self, request_id: RequestId) -> DispatchResult<SessionHandle> {
        if let Some(found) = self.sessions.get(&request_id) {
            return Ok(found.value().clone());
        }

        let request = self
            .bounded(self.deps.store.load_request(request_id))
            .await?
            .ok_or(DispatchError::RequestNotFound(request_id))?;
        debug!(request_id = %request_id, "session loaded from store");
        Ok(self.adopt(request).await)
    }

    /// Install a record loaded from the store as the live session.
    ///
    /// A searching request gets its persisted offer back and a deadline for
    /// whatever time that offer has left.
    async fn adopt(&self, request: EmergencyRequest) -> SessionHandle {
        let request_id = request.id;
        let searching = request.status == RequestStatus::Searching;
        let offer = if searching {
            match self.bounded(self.deps.store.load_offer(request_id)).await {
                Ok(offer) => offer,
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "failed to load offer");
                    None
                }
            }
        } else {
            None
        };
        let remaining = offer
            .as_ref()
            .map(|o| o.remaining(Utc::now()))
            .unwrap_or_default();

        let handle = match self.sessions.entry(request_id) {
            Entry::Occupied(live) => return live.get().clone(),
            Entry::Vacant(slot) => slot
                .insert(Arc::new(Mutex::new(Session::loaded(request, offer))))
                .value()
                .clone(),
        };

        if searching {
            self.arm_deadline(request_id, remaining).await;
            info!(request_id = %request_id, remaining_seconds = remaining.as_secs(), "search resumed");
        }
        handle
    }

    /// Lock the live session for `request_id`, loading it if needed.
    ///
    /// A handle evicted while we waited on it is stale; retry against the
    /// current one.
    async fn lock_session(&self, request_id: RequestId) -> DispatchResult<SessionLock> {
        loop {
            let handle = self.session(request_id).await?;
            let lock = self.lock_handle(handle).await;
            let current = self
                .sessions
                .get(&request_id)
                .is_some_and(|live| Arc::ptr_eq(live.value(), &lock.handle));
            if current {
                return Ok(lock);
            }
            debug!(request_id = %request_id, "session evicted while waiting, reloading");
        }
    }

    async fn lock_handle(&self, handle: SessionHandle) -> SessionLock {
        SessionLock {
            guard: handle.clone().lock_owned().await,
            handle,
            sessions: self.sessions.clone(),
        }
    }

    async fn arm_deadline(&self, request_id: RequestId, after: std::time::Duration) {
        let manager = self.clone();
        self.deadlines
            .arm(request_id, after, async move {
                manager.expire_offer(request_id).await;
            })
            .await;
    }

    /// Take the open offer, stop its deadline and drop the persisted copy.
    async fn close_offer(&self, session: &mut Session) -> Option<OfferBroadcast> {
        let request_id = session.request.id;
        let offer = session.offer.take();
        self.deadlines.disarm(request_id).await;
        if offer.is_some() {
            if let Err(e) = self.bounded(self.deps.store.delete_offer(request_id)).await {
                warn!(request_id = %request_id, error = %e, "failed to delete offer");
            }
        }
        offer
    }

    /// Geo query at the tier radius, then once more at twice the radius.
    async fn find_candidates(&self, request: &EmergencyRequest) -> Vec<Candidate> {
        let query = CandidateQuery {
            point: request.pickup.point,
            radius_meters: self.deps.config.search_radius(request.service_tier),
            class: request.responder_class,
            tier: request.service_tier,
            limit: self.deps.config.max_candidates,
        };

        if let Some(found) = self.query_index(&query).await {
            if !found.is_empty() {
                return found;
            }
        }

        let wider = query.widened();
        debug!(radius_meters = wider.radius_meters, "no candidates nearby, widening search");
        self.query_index(&wider).await.unwrap_or_default()
    }

    async fn query_index(&self, query: &CandidateQuery) -> Option<Vec<Candidate>> {
        let timeout = self.deps.config.dependency_timeout;
        match tokio::time::timeout(timeout, self.deps.geo_index.find_candidates(query)).await {
            Ok(Ok(found)) => Some(found),
            Ok(Err(e)) => {
                warn!(error = %e, radius_meters = query.radius_meters, "geo index failed");
                None
            }
            Err(_) => {
                warn!(radius_meters = query.radius_meters, "geo index timed out");
                None
            }
        }
    }

    /// Bind `responder_id` and move the request to `Accepted` as one unit.
    ///
    /// If the store refuses the write the responder is released again and
    /// the request is left untouched.
    async fn bind(&self, session: &mut Session, responder_id: ResponderId) -> DispatchResult<()> {
        let request_id = session.request.id;
        check_bind(session.request.status)?;

        if !self.deps.presence.try_bind(responder_id, request_id) {
            return Err(match self.deps.presence.get(responder_id) {
                None => DispatchError::ResponderNotFound(responder_id),
                Some(_) => DispatchError::ResponderUnavailable(responder_id),
            });
        }

        let at = Utc::now();
        let mut next = session.request.clone();
        next.enter(RequestStatus::Accepted, at);
        next.assigned_responder = Some(responder_id);
        next.metrics.search_end_time = Some(at);
        next.metrics.response_time_seconds = Some((at - next.created_at).num_seconds().max(0));

        if let Err(e) = self.persist(&next).await {
            self.deps.presence.unbind(responder_id);
            warn!(request_id = %request_id, responder_id = %responder_id, "bind rolled back");
            return Err(e);
        }

        session.commit(next);
        self.sync_responder(responder_id).await;
        info!(
            request_id = %request_id,
            responder_id = %responder_id,
            response_time_seconds = session.request.metrics.response_time_seconds,
            "request accepted"
        );
        Ok(())
    }

    /// Post-bind work: hospital suggestions (stored once) and the accepted,
    /// confirmed and withdrawn notifications.
    ///
    /// Runs with the session still locked, so a cancel cannot slip in
    /// between the bind and its announcement.
    async fn announce_binding(
        &self,
        session: &mut Session,
        losers: Vec<ResponderId>,
    ) -> EmergencyRequest {
        let request_id = session.request.id;
        if session.request.hospital_suggestions.is_empty() {
            let suggestions = self
                .recommender
                .suggest(
                    session.request.emergency_type,
                    session.request.pickup.point,
                    self.deps.config.search_radius(session.request.service_tier),
                )
                .await;
            if !suggestions.is_empty() {
                session.request.hospital_suggestions = suggestions;
                session.request.updated_at = Utc::now();
                session.stored = self.persist_best_effort(&session.request).await;
            }
        }
        let request = session.request.clone();
        debug!(request_id = %request_id, suggestions = request.hospital_suggestions.len(), "hospital suggestions stored");

        let Some(responder_id) = request.assigned_responder else {
            return request;
        };

        if let Some(responder) = self.deps.presence.get(responder_id) {
            let eta_seconds = match responder.position {
                Some(position) => Some(
                    self.estimator
                        .estimate_eta(position, request.pickup.point)
                        .await
                        .duration_seconds,
                ),
                None => None,
            };
            self.deps
                .gateway
                .notify_requester(
                    request.requester_id,
                    DispatchEvent::Accepted {
                        request_id,
                        responder: ResponderSummary::from_presence(&responder, eta_seconds),
                        suggested_destinations: request.hospital_suggestions.clone(),
                    },
                )
                .await;
        }

        self.deps
            .gateway
            .notify_responder(
                responder_id,
                DispatchEvent::AcceptConfirmed {
                    request_id,
                    requester_id: request.requester_id,
                    pickup: request.pickup.clone(),
                    suggested_destinations: request.hospital_suggestions.clone(),
                },
            )
            .await;

        self.deps
            .gateway
            .notify_responders(losers, DispatchEvent::OfferTaken { request_id })
            .await;

        request
    }

    /// Deadline side effects. No-op if the request resolved meanwhile.
    async fn expire_offer(&self, request_id: RequestId) {
        let Some(handle) = self.sessions.get(&request_id).map(|s| s.value().clone()) else {
            return;
        };

        let mut guard = self.lock_handle(handle).await;
        if check_exhausted(guard.request.status).is_err() {
            debug!(request_id = %request_id, status = %guard.request.status, "offer already resolved");
            return;
        }

        let at = Utc::now();
        guard.request.enter(RequestStatus::NoResponderAvailable, at);
        guard.request.metrics.search_end_time = Some(at);
        guard.stored = self.persist_best_effort(&guard.request).await;
        let offer = self.close_offer(&mut guard).await;
        let requester_id = guard.request.requester_id;
        drop(guard);

        info!(request_id = %request_id, "offer expired without an accept");
        self.deps
            .gateway
            .notify_requester(requester_id, DispatchEvent::Timeout { request_id })
            .await;
        if let Some(offer) = offer {
            self.deps
                .gateway
                .notify_responders(offer.notified(), DispatchEvent::OfferTaken { request_id })
                .await;
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> DispatchResult<T> {
        let timeout = self.deps.config.dependency_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DispatchError::Storage(e)),
            Err(_) => Err(DispatchError::Storage(anyhow::anyhow!(
                "store call timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn persist(&self, request: &EmergencyRequest) -> DispatchResult<()> {
        if let Err(e) = self.bounded(self.deps.store.save_request(request)).await {
            error!(request_id = %request.id, error = %e, "failed to persist request");
            return Err(e);
        }
        Ok(())
    }

    /// Returns whether the write landed.
    async fn persist_best_effort(&self, request: &EmergencyRequest) -> bool {
        self.persist(request).await.is_ok()
    }

    async fn sync_responder(&self, responder_id: ResponderId) {
        let Some(record) = self.deps.presence.get(responder_id) else {
            return;
        };
        if let Err(e) = self.bounded(self.deps.store.save_responder(&record)).await {
            warn!(responder_id = %responder_id, error = %e, "failed to persist responder");
        }
    }
}

fn ensure_destination_selectable(request: &EmergencyRequest) -> DispatchResult<()> {
    if destination_selectable(request.status) {
        Ok(())
    } else {
        Err(DispatchError::validation(format!(
            "destination cannot be chosen while {}",
            request.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Location, OperatorId, RequesterId};
    use crate::domains::dispatch::models::EmergencyType;
    use crate::domains::presence::models::AvailabilityStatus;
    use crate::kernel::test_dependencies::RecordingStore;
    use crate::kernel::{BaseDispatchStore, TestDependencies};
    use std::time::Duration;

    struct Fixture {
        manager: SessionManager,
        store: Arc<RecordingStore>,
    }

    fn fixture() -> Fixture {
        let deps = TestDependencies::new();
        let store = deps.store.clone();
        Fixture {
            manager: SessionManager::new(deps.into_deps()),
            store,
        }
    }

    async fn online(manager: &SessionManager, lon: f64) -> ResponderId {
        let record = manager
            .register_responder(None, ResponderClass::Bls, ServiceTier::Public, None)
            .await
            .unwrap();
        manager
            .set_online(record.id, GeoPoint::new(0.0, lon))
            .await
            .unwrap();
        record.id
    }

    fn input(requester: RequesterId) -> NewEmergencyRequest {
        NewEmergencyRequest::builder()
            .requester_id(requester)
            .emergency_type(EmergencyType::Trauma)
            .pickup(Location::new(GeoPoint::new(0.0, 0.0), "Pickup"))
            .responder_class(ResponderClass::Bls)
            .build()
    }

    #[tokio::test]
    async fn test_invalid_pickup_rejected_before_creation() {
        let f = fixture();
        let mut bad = input(RequesterId::new());
        bad.pickup.point = GeoPoint::new(95.0, 0.0);

        let err = f.manager.create_request(bad).await.unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(f.store.request_writes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_bind_write_rolls_back() {
        let f = fixture();
        let responder = online(&f.manager, 0.01).await;
        let request = f.manager.create_request(input(RequesterId::new())).await.unwrap();

        f.store.fail_writes(true);
        let err = f.manager.accept_offer(request.id, responder).await.unwrap_err();
        assert_eq!(err.code(), "storage");

        let after = f.manager.get_request(request.id).await.unwrap();
        assert_eq!(after.status, RequestStatus::Searching);
        assert!(after.assigned_responder.is_none());
        assert_eq!(
            f.manager.get_responder(responder).unwrap().status,
            AvailabilityStatus::Available
        );

        f.store.fail_writes(false);
        let accepted = f.manager.accept_offer(request.id, responder).await.unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_reject_requires_offer() {
        let f = fixture();
        let offered = online(&f.manager, 0.01).await;
        let request = f.manager.create_request(input(RequesterId::new())).await.unwrap();

        f.manager
            .reject_offer(request.id, offered, Some("fuel".into()))
            .await
            .unwrap();
        let err = f
            .manager
            .reject_offer(request.id, ResponderId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_authorized");

        let still = f.manager.get_request(request.id).await.unwrap();
        assert_eq!(still.status, RequestStatus::Searching);
    }

    #[tokio::test]
    async fn test_operator_assignment_binds_outside_offer() {
        let f = fixture();
        let requester = RequesterId::new();
        let request = f.manager.create_request(input(requester)).await.unwrap();
        assert_eq!(request.status, RequestStatus::NoResponderAvailable);

        // Terminal requests cannot be assigned
        let late = online(&f.manager, 0.5).await;
        let err = f
            .manager
            .assign_responder(request.id, Actor::Operator(OperatorId::new()), late)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");

        let searching = {
            let _nearby = online(&f.manager, 0.01).await;
            f.manager.create_request(input(requester)).await.unwrap()
        };
        let err = f
            .manager
            .assign_responder(searching.id, Actor::Requester(requester), late)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_authorized");

        let assigned = f
            .manager
            .assign_responder(searching.id, Actor::Operator(OperatorId::new()), late)
            .await
            .unwrap();
        assert_eq!(assigned.assigned_responder, Some(late));
    }

    #[tokio::test]
    async fn test_rating_rules() {
        let f = fixture();
        let requester = RequesterId::new();
        let responder = online(&f.manager, 0.01).await;
        let request = f.manager.create_request(input(requester)).await.unwrap();
        f.manager.accept_offer(request.id, responder).await.unwrap();

        let err = f
            .manager
            .rate_service(request.id, Actor::Requester(requester), 5, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");

        let mut status = RequestStatus::Accepted;
        while let Some(next) = status.next_ride_step() {
            f.manager
                .advance_status(request.id, Actor::Responder(responder), next)
                .await
                .unwrap();
            status = next;
        }

        let err = f
            .manager
            .rate_service(request.id, Actor::Responder(responder), 5, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_authorized");

        let rated = f
            .manager
            .rate_service(request.id, Actor::Requester(requester), 4, Some("quick".into()))
            .await
            .unwrap();
        assert_eq!(rated.rating.as_ref().map(|r| r.score), Some(4));

        let err = f
            .manager
            .rate_service(request.id, Actor::Requester(requester), 5, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_rated");

        let presence = f.manager.get_responder(responder).unwrap();
        assert_eq!(presence.rating_count, 1);
        assert_eq!(presence.rating_average, 4.0);
        assert_eq!(presence.completed_rides, 1);
        assert_eq!(presence.status, AvailabilityStatus::Available);
    }

    #[tokio::test]
    async fn test_session_reloaded_from_store() {
        let deps = TestDependencies::new();
        let first = SessionManager::new(deps.clone().into_deps());
        let created = first.create_request(input(RequesterId::new())).await.unwrap();

        // Fresh manager over the same store
        let second = SessionManager::new(deps.into_deps());
        let loaded = second.get_request(created.id).await.unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.status, RequestStatus::NoResponderAvailable);

        let err = second.get_request(RequestId::new()).await.unwrap_err();
        assert_eq!(err.code(), "request_not_found");
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    /// Move a persisted offer deadline relative to the wall clock.
    async fn shift_deadline(deps: &TestDependencies, request_id: RequestId, by: chrono::Duration) {
        let mut offer = deps.store.load_offer(request_id).await.unwrap().unwrap();
        offer.deadline = Utc::now() + by;
        deps.store.save_offer(&offer).await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_sessions_evicted_but_readable() {
        let f = fixture();
        let requester = RequesterId::new();

        let unmatched = f.manager.create_request(input(requester)).await.unwrap();
        assert_eq!(unmatched.status, RequestStatus::NoResponderAvailable);
        assert_eq!(f.manager.live_sessions(), 0);

        let responder = online(&f.manager, 0.01).await;
        let cancelled = f.manager.create_request(input(requester)).await.unwrap();
        let ride = f.manager.create_request(input(requester)).await.unwrap();
        assert_eq!(f.manager.live_sessions(), 2);
        assert_eq!(f.store.offer_count(), 2);

        f.manager
            .cancel_request(cancelled.id, Actor::Requester(requester), None)
            .await
            .unwrap();
        assert_eq!(f.manager.live_sessions(), 1);

        f.manager.accept_offer(ride.id, responder).await.unwrap();
        let mut status = RequestStatus::Accepted;
        while let Some(next) = status.next_ride_step() {
            f.manager
                .advance_status(ride.id, Actor::Responder(responder), next)
                .await
                .unwrap();
            status = next;
        }
        assert_eq!(f.manager.live_sessions(), 0);
        assert_eq!(f.store.offer_count(), 0);

        for (id, expected) in [
            (unmatched.id, RequestStatus::NoResponderAvailable),
            (cancelled.id, RequestStatus::Cancelled),
            (ride.id, RequestStatus::Completed),
        ] {
            assert_eq!(f.manager.get_request(id).await.unwrap().status, expected);
        }
        assert_eq!(f.manager.live_sessions(), 0);

        // Rating still works against the reloaded record, and only once
        f.manager
            .rate_service(ride.id, Actor::Requester(requester), 5, None)
            .await
            .unwrap();
        let err = f
            .manager
            .rate_service(ride.id, Actor::Requester(requester), 4, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_rated");
        assert_eq!(f.manager.live_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsaved_expiry_keeps_session_live() {
        let f = fixture();
        online(&f.manager, 0.01).await;
        let request = f.manager.create_request(input(RequesterId::new())).await.unwrap();

        f.store.fail_writes(true);
        tokio::time::sleep(Duration::from_secs(121)).await;
        settle().await;

        // The store still says searching; memory is authoritative until written
        assert_eq!(f.manager.live_sessions(), 1);
        assert_eq!(
            f.manager.get_request(request.id).await.unwrap().status,
            RequestStatus::NoResponderAvailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_resumes_open_search() {
        let deps = TestDependencies::new();
        let first = SessionManager::new(deps.clone().into_deps());
        let responder = online(&first, 0.01).await;
        let kept = first.create_request(input(RequesterId::new())).await.unwrap();
        let left = first.create_request(input(RequesterId::new())).await.unwrap();
        first.shutdown().await;
        // Down for 30s of the 120s window
        shift_deadline(&deps, left.id, chrono::Duration::seconds(90)).await;

        let second = SessionManager::new(deps.clone().into_deps());
        let restored = second.restore().await.unwrap();
        assert_eq!(
            restored,
            RestoreSummary {
                responders: 1,
                searching: 2
            }
        );

        let accepted = second.accept_offer(kept.id, responder).await.unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);

        // Only the time left on the persisted offer
        tokio::time::sleep(Duration::from_secs(89)).await;
        settle().await;
        assert_eq!(
            second.get_request(left.id).await.unwrap().status,
            RequestStatus::Searching
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(
            second.get_request(left.id).await.unwrap().status,
            RequestStatus::NoResponderAvailable
        );
        assert_eq!(deps.store.offer_count(), 0);
        assert_eq!(second.live_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_expires_search_past_deadline() {
        use crate::domains::gateway::Topic;

        let deps = TestDependencies::new();
        let first = SessionManager::new(deps.clone().into_deps());
        let requester = RequesterId::new();
        let responder = online(&first, 0.01).await;
        let request = first.create_request(input(requester)).await.unwrap();
        first.shutdown().await;
        shift_deadline(&deps, request.id, chrono::Duration::minutes(-10)).await;

        let second = SessionManager::new(deps.clone().into_deps());
        let mut requester_rx = second.deps().gateway.subscribe(Topic::Requester(requester)).await;
        let mut responder_rx = second.deps().gateway.subscribe(Topic::Responder(responder)).await;
        assert_eq!(second.restore().await.unwrap().searching, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        settle().await;

        let expired = second.get_request(request.id).await.unwrap();
        assert_eq!(expired.status, RequestStatus::NoResponderAvailable);
        assert_eq!(
            requester_rx.try_recv().unwrap(),
            DispatchEvent::Timeout {
                request_id: request.id
            }
        );
        assert_eq!(responder_rx.try_recv().unwrap().kind(), "request.offerTaken");

        let err = second.accept_offer(request.id, responder).await.unwrap_err();
        assert_eq!(err.code(), "already_taken");
    }
}
