use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{RequestId, ResponderId};
use crate::domains::geo_index::Candidate;

/// The open offer for a searching request.
///
/// Persisted next to the request from broadcast until it is resolved, so a
/// restarted process can re-arm the deadline for the time left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferBroadcast {
    pub request_id: RequestId,
    pub candidates: Vec<Candidate>,
    pub deadline: DateTime<Utc>,
}

impl OfferBroadcast {
    pub fn includes(&self, responder_id: ResponderId) -> bool {
        self.candidates.iter().any(|c| c.responder_id == responder_id)
    }

    pub fn notified(&self) -> impl Iterator<Item = ResponderId> + '_ {
        self.candidates.iter().map(|c| c.responder_id)
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.deadline - now).to_std().unwrap_or_default()
    }

    /// Everyone notified except `winner`
    pub fn losers(&self, winner: ResponderId) -> Vec<ResponderId> {
        self.notified().filter(|id| *id != winner).collect()
    }
}
