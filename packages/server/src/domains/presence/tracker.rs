//! Responder presence tracker.
//!
//! Owns every [`ResponderPresence`] record. All mutations, including the
//! compare-and-set bind that resolves the dispatch race, happen while holding
//! the record's map entry, so concurrent accepts for the same responder
//! serialize on that entry and at most one of them observes `Available`.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use super::models::{
    AvailabilityStatus, ResponderClass, ResponderPresence, ServiceTier,
};
use crate::common::{GeoPoint, RequestId, ResponderId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    #[error("responder {0} not found")]
    NotFound(ResponderId),

    #[error("responder {0} is already registered")]
    AlreadyRegistered(ResponderId),

    #[error("responder {0} is on duty")]
    Busy(ResponderId),
}

#[derive(Default)]
pub struct PresenceTracker {
    records: DashMap<ResponderId, ResponderPresence>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker from persisted records (startup).
    pub fn restore(&self, records: impl IntoIterator<Item = ResponderPresence>) {
        for record in records {
            self.records.insert(record.id, record);
        }
    }

    pub fn register(
        &self,
        id: ResponderId,
        class: ResponderClass,
        tier: ServiceTier,
        position: Option<GeoPoint>,
    ) -> Result<ResponderPresence, PresenceError> {
        match self.records.entry(id) {
            Entry::Occupied(_) => Err(PresenceError::AlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                let record = ResponderPresence::new(id, class, tier, position);
                slot.insert(record.clone());
                info!(responder_id = %id, class = class.as_str(), tier = tier.as_str(), "responder registered");
                Ok(record)
            }
        }
    }

    pub fn get(&self, id: ResponderId) -> Option<ResponderPresence> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Mark a responder ready for dispatch at `position`.
    pub fn set_available(
        &self,
        id: ResponderId,
        position: GeoPoint,
    ) -> Result<ResponderPresence, PresenceError> {
        self.update_unbound(id, |record| {
            record.status = AvailabilityStatus::Available;
            record.position = Some(position);
        })
    }

    pub fn set_offline(&self, id: ResponderId) -> Result<ResponderPresence, PresenceError> {
        self.update_unbound(id, |record| {
            record.status = AvailabilityStatus::Offline;
        })
    }

    pub fn set_maintenance(&self, id: ResponderId) -> Result<ResponderPresence, PresenceError> {
        self.update_unbound(id, |record| {
            record.status = AvailabilityStatus::Maintenance;
        })
    }

    /// Atomically bind an available responder to a request.
    ///
    /// Returns `false` for unknown responders and for anyone not currently
    /// `Available`.
    pub fn try_bind(&self, id: ResponderId, request_id: RequestId) -> bool {
        let Some(mut record) = self.records.get_mut(&id) else {
            return false;
        };
        if record.status != AvailabilityStatus::Available {
            debug!(responder_id = %id, request_id = %request_id, status = record.status.as_str(), "bind refused");
            return false;
        }
        record.status = AvailabilityStatus::OnDuty;
        record.session = Some(request_id);
        record.updated_at = Utc::now();
        true
    }

    /// Return a bound responder to `Available`. No-op (returns `None`) when
    /// the responder is not bound.
    pub fn unbind(&self, id: ResponderId) -> Option<ResponderPresence> {
        self.release(id, false)
    }

    /// Unbind after a completed ride and count it.
    pub fn finish_ride(&self, id: ResponderId) -> Option<ResponderPresence> {
        self.release(id, true)
    }

    /// Record a new position. Allowed in every status.
    pub fn update_position(
        &self,
        id: ResponderId,
        position: GeoPoint,
    ) -> Result<ResponderPresence, PresenceError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PresenceError::NotFound(id))?;
        record.position = Some(position);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Fold a 1-5 rating into the responder's running average.
    pub fn record_rating(&self, id: ResponderId, score: u8) -> Option<ResponderPresence> {
        let mut record = self.records.get_mut(&id)?;
        let n = record.rating_count as f64;
        record.rating_average = (record.rating_average * n + score as f64) / (n + 1.0);
        record.rating_count += 1;
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    /// Snapshot of every responder currently eligible for an offer.
    pub fn available(&self) -> Vec<ResponderPresence> {
        self.records
            .iter()
            .filter(|r| r.is_available())
            .map(|r| r.value().clone())
            .collect()
    }

    fn release(&self, id: ResponderId, completed: bool) -> Option<ResponderPresence> {
        let mut record = self.records.get_mut(&id)?;
        if record.status != AvailabilityStatus::OnDuty {
            return None;
        }
        record.status = AvailabilityStatus::Available;
        record.session = None;
        if completed {
            record.completed_rides += 1;
        }
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    fn update_unbound(
        &self,
        id: ResponderId,
        apply: impl FnOnce(&mut ResponderPresence),
    ) -> Result<ResponderPresence, PresenceError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PresenceError::NotFound(id))?;
        if record.status == AvailabilityStatus::OnDuty {
            return Err(PresenceError::Busy(id));
        }
        apply(&mut record);
        record.updated_at = Utc::now();
        info!(responder_id = %id, status = record.status.as_str(), "responder status changed");
        Ok(record.clone())
    }
}
