use anyhow::Result;
use async_trait::async_trait;

use super::BaseHospitalDirectory;
use crate::common::utils::distance_between;
use crate::common::{GeoPoint, HospitalId};
use crate::domains::ranking::models::{Hospital, NearbyHospital};

/// Hospital directory held in memory, seeded at startup.
pub struct InMemoryHospitalDirectory {
    hospitals: Vec<Hospital>,
}

impl InMemoryHospitalDirectory {
    pub fn new(hospitals: Vec<Hospital>) -> Self {
        Self { hospitals }
    }

    /// Load a seed file: a JSON array of hospitals.
    pub fn from_json(raw: &str) -> Result<Self> {
        let hospitals: Vec<Hospital> = serde_json::from_str(raw)?;
        Ok(Self::new(hospitals))
    }

    pub fn len(&self) -> usize {
        self.hospitals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hospitals.is_empty()
    }
}

#[async_trait]
impl BaseHospitalDirectory for InMemoryHospitalDirectory {
    async fn hospitals_within(&self, point: GeoPoint, radius_meters: f64) -> Result<Vec<NearbyHospital>> {
        let mut found: Vec<NearbyHospital> = self
            .hospitals
            .iter()
            .map(|h| NearbyHospital {
                distance_meters: distance_between(&point, &h.location.point),
                hospital: h.clone(),
            })
            .filter(|n| n.distance_meters <= radius_meters)
            .collect();

        found.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        Ok(found)
    }

    async fn find(&self, id: HospitalId) -> Result<Option<Hospital>> {
        Ok(self.hospitals.iter().find(|h| h.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Location;

    fn hospital(name: &str, lon: f64) -> Hospital {
        Hospital::builder()
            .name(name)
            .location(Location::new(GeoPoint::new(0.0, lon), ""))
            .build()
    }

    #[tokio::test]
    async fn test_nearest_first_within_radius() {
        let dir = InMemoryHospitalDirectory::new(vec![
            hospital("far", 0.05),
            hospital("near", 0.01),
            hospital("outside", 0.5),
        ]);

        let found = dir
            .hospitals_within(GeoPoint::new(0.0, 0.0), 10_000.0)
            .await
            .unwrap();

        let names: Vec<_> = found.iter().map(|n| n.hospital.name.as_str()).collect();
        assert_eq!(names, vec!["near", "far"]);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let h = hospital("one", 0.0);
        let id = h.id;
        let dir = InMemoryHospitalDirectory::new(vec![h]);
        assert_eq!(dir.find(id).await.unwrap().unwrap().name, "one");
        assert!(dir.find(HospitalId::new()).await.unwrap().is_none());
    }

    #[test]
    fn test_from_json_seed() {
        let raw = r#"[{
            "id": "0190f1d2-7c1e-7a3b-9c1d-2f4e5a6b7c8d",
            "name": "City General",
            "location": { "latitude": 44.97, "longitude": -93.26, "address": "701 Park Ave" },
            "tier": "government",
            "specializations": ["general", "trauma_center"],
            "availableUnits": 6,
            "icuBedsAvailable": 2,
            "rating": 4.4
        }]"#;
        let dir = InMemoryHospitalDirectory::from_json(raw).unwrap();
        assert_eq!(dir.len(), 1);
    }
}
