use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use super::models::{HospitalSuggestion, NearbyHospital};
use super::utils::scoring::{accepted_specializations, rank_by_score, score, scoring_input};
use crate::common::GeoPoint;
use crate::domains::dispatch::models::EmergencyType;
use crate::domains::routing::EtaEstimator;
use crate::kernel::BaseHospitalDirectory;

/// Ranks nearby hospitals for an emergency.
///
/// Primary pass: within `radius`, with free beds and a suitable
/// specialization. If that finds nothing, a second pass at twice the radius
/// drops the specialization filter. Directory failures degrade to an empty
/// list.
#[derive(Clone)]
pub struct HospitalRecommender {
    directory: Arc<dyn BaseHospitalDirectory>,
    estimator: EtaEstimator,
    max_suggestions: usize,
    timeout: Duration,
}

impl HospitalRecommender {
    pub fn new(
        directory: Arc<dyn BaseHospitalDirectory>,
        estimator: EtaEstimator,
        max_suggestions: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            directory,
            estimator,
            max_suggestions,
            timeout,
        }
    }

    pub async fn suggest(
        &self,
        emergency: EmergencyType,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Vec<HospitalSuggestion> {
        let accepted = accepted_specializations(emergency);

        let mut picked: Vec<NearbyHospital> = self
            .nearby(point, radius_meters)
            .await
            .into_iter()
            .filter(|h| h.hospital.available_units > 0)
            .filter(|h| accepted.iter().any(|s| h.hospital.offers(*s)))
            .take(self.max_suggestions)
            .collect();

        if picked.is_empty() {
            debug!(radius = radius_meters * 2.0, "no specialised hospital nearby, widening search");
            picked = self
                .nearby(point, radius_meters * 2.0)
                .await
                .into_iter()
                .filter(|h| h.hospital.available_units > 0)
                .take(self.max_suggestions)
                .collect();
        }

        let etas = join_all(
            picked
                .iter()
                .map(|h| self.estimator.estimate_eta(point, h.hospital.location.point)),
        )
        .await;

        let mut scored: Vec<_> = picked
            .into_iter()
            .zip(etas)
            .map(|(nearby, eta)| {
                let s = score(&scoring_input(&nearby.hospital, nearby.distance_meters, emergency));
                ((nearby, eta), s)
            })
            .collect();
        rank_by_score(&mut scored);

        scored
            .into_iter()
            .map(|((nearby, eta), s)| HospitalSuggestion {
                hospital_id: nearby.hospital.id,
                name: nearby.hospital.name,
                address: nearby.hospital.location.address,
                distance_meters: nearby.distance_meters.round(),
                eta_seconds: eta.duration_seconds,
                score: s.value,
                reason: s.reason,
            })
            .collect()
    }

    async fn nearby(&self, point: GeoPoint, radius_meters: f64) -> Vec<NearbyHospital> {
        match tokio::time::timeout(self.timeout, self.directory.hospitals_within(point, radius_meters)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(error = %e, "hospital directory failed");
                Vec::new()
            }
            Err(_) => {
                warn!("hospital directory timed out");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Location;
    use crate::domains::ranking::models::{Hospital, HospitalTier, Specialization};
    use crate::kernel::InMemoryHospitalDirectory;

    fn hospital(name: &str, lon: f64, specs: Vec<Specialization>, beds: u32) -> Hospital {
        Hospital::builder()
            .name(name)
            .location(Location::new(GeoPoint::new(0.0, lon), format!("{} Rd", name)))
            .tier(HospitalTier::Private)
            .specializations(specs)
            .available_units(beds)
            .build()
    }

    fn recommender(hospitals: Vec<Hospital>) -> HospitalRecommender {
        HospitalRecommender::new(
            Arc::new(InMemoryHospitalDirectory::new(hospitals)),
            EtaEstimator::straight_line(10.0),
            5,
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_specialist_ranked_first() {
        let r = recommender(vec![
            hospital("General", 0.01, vec![Specialization::General], 3),
            hospital("Heart", 0.02, vec![Specialization::Cardiology], 3),
        ]);

        let found = r
            .suggest(EmergencyType::HeartAttack, GeoPoint::new(0.0, 0.0), 10_000.0)
            .await;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Heart");
        assert!(found[0].reason.contains("Specialized in cardiology"));
        assert!(found[0].eta_seconds > 0);
    }

    #[tokio::test]
    async fn test_primary_filters_unsuitable_and_full() {
        let r = recommender(vec![
            hospital("Oncology", 0.01, vec![Specialization::Oncology], 3),
            hospital("Full", 0.01, vec![Specialization::General], 0),
            hospital("Ok", 0.03, vec![Specialization::General], 1),
        ]);

        let found = r
            .suggest(EmergencyType::Stroke, GeoPoint::new(0.0, 0.0), 10_000.0)
            .await;

        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ok"]);
    }

    #[tokio::test]
    async fn test_fallback_widens_and_relaxes() {
        // ~15.5 km away, no suitable specialization
        let r = recommender(vec![hospital("Far", 0.14, vec![Specialization::Oncology], 2)]);

        let found = r
            .suggest(EmergencyType::Burns, GeoPoint::new(0.0, 0.0), 10_000.0)
            .await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Far");
    }

    #[tokio::test]
    async fn test_caps_suggestions() {
        let hospitals = (1..=8)
            .map(|i| hospital(&format!("H{}", i), i as f64 * 0.005, vec![Specialization::General], 1))
            .collect();
        let found = recommender(hospitals)
            .suggest(EmergencyType::Other, GeoPoint::new(0.0, 0.0), 10_000.0)
            .await;
        assert_eq!(found.len(), 5);
    }

    #[tokio::test]
    async fn test_nothing_anywhere_is_empty() {
        let found = recommender(vec![])
            .suggest(EmergencyType::Other, GeoPoint::new(0.0, 0.0), 10_000.0)
            .await;
        assert!(found.is_empty());
    }
}
