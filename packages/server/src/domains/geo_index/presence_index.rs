use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::models::{Candidate, CandidateQuery};
use crate::common::utils::distance_between;
use crate::domains::presence::{PresenceTracker, ResponderPresence};
use crate::kernel::BaseGeoIndex;

/// Geo index backed directly by the in-process presence tracker.
pub struct PresenceGeoIndex {
    presence: Arc<PresenceTracker>,
}

impl PresenceGeoIndex {
    pub fn new(presence: Arc<PresenceTracker>) -> Self {
        Self { presence }
    }
}

#[async_trait]
impl BaseGeoIndex for PresenceGeoIndex {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        Ok(select_candidates(self.presence.available(), query))
    }
}

/// Filter, sort nearest-first and cap.
///
/// Only available responders with a known position, the exact class and the
/// exact tier qualify. Ties keep input order.
pub fn select_candidates(
    records: impl IntoIterator<Item = ResponderPresence>,
    query: &CandidateQuery,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = records
        .into_iter()
        .filter(|r| r.is_available() && r.class == query.class && r.tier == query.tier)
        .filter_map(|r| {
            let position = r.position?;
            let distance = distance_between(&query.point, &position);
            (distance <= query.radius_meters).then(|| Candidate {
                responder_id: r.id,
                position,
                distance_meters: distance.round(),
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    candidates.truncate(query.limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{GeoPoint, ResponderId};
    use crate::domains::presence::{AvailabilityStatus, ResponderClass, ServiceTier};

    fn responder(lon: f64, class: ResponderClass, tier: ServiceTier) -> ResponderPresence {
        let mut r = ResponderPresence::new(
            ResponderId::new(),
            class,
            tier,
            Some(GeoPoint::new(0.0, lon)),
        );
        r.status = AvailabilityStatus::Available;
        r
    }

    fn query(radius: f64) -> CandidateQuery {
        CandidateQuery {
            point: GeoPoint::new(0.0, 0.0),
            radius_meters: radius,
            class: ResponderClass::Bls,
            tier: ServiceTier::Public,
            limit: 10,
        }
    }

    #[test]
    fn test_nearest_first_with_rounded_distance() {
        let far = responder(0.05, ResponderClass::Bls, ServiceTier::Public);
        let near = responder(0.01, ResponderClass::Bls, ServiceTier::Public);

        let found = select_candidates(vec![far.clone(), near.clone()], &query(10_000.0));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].responder_id, near.id);
        assert_eq!(found[1].responder_id, far.id);
        assert_eq!(found[0].distance_meters, found[0].distance_meters.round());
    }

    #[test]
    fn test_filters_class_tier_and_status() {
        let als = responder(0.01, ResponderClass::Als, ServiceTier::Public);
        let private = responder(0.01, ResponderClass::Bls, ServiceTier::Private);
        let mut busy = responder(0.01, ResponderClass::Bls, ServiceTier::Public);
        busy.status = AvailabilityStatus::OnDuty;

        assert!(select_candidates(vec![als, private, busy], &query(10_000.0)).is_empty());
    }

    #[test]
    fn test_excludes_outside_radius() {
        // ~5.5 km away
        let r = responder(0.05, ResponderClass::Bls, ServiceTier::Public);
        assert!(select_candidates(vec![r.clone()], &query(5_000.0)).is_empty());
        assert_eq!(select_candidates(vec![r], &query(10_000.0)).len(), 1);
    }

    #[test]
    fn test_caps_at_limit() {
        let records: Vec<_> = (1..=15)
            .map(|i| responder(i as f64 * 0.001, ResponderClass::Bls, ServiceTier::Public))
            .collect();
        let found = select_candidates(records, &query(10_000.0));
        assert_eq!(found.len(), 10);
    }

    #[test]
    fn test_widened_query_is_superset() {
        let near = responder(0.01, ResponderClass::Bls, ServiceTier::Public);
        let mid = responder(0.08, ResponderClass::Bls, ServiceTier::Public);
        let q = query(5_000.0);

        let narrow = select_candidates(vec![near.clone(), mid.clone()], &q);
        let wide = select_candidates(vec![near.clone(), mid.clone()], &q.widened());

        assert_eq!(narrow.len(), 1);
        assert_eq!(wide.len(), 2);
        assert!(narrow.iter().all(|c| wide.contains(c)));
    }
}
