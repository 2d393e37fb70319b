// Common types used across multiple domains and layers
//
// Geographic primitives shared by the geo index, the estimator, the ranker
// and the dispatch records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCoordinate {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject NaN and out-of-range coordinates before they reach the engine.
    pub fn validate(&self) -> Result<(), InvalidCoordinate> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(InvalidCoordinate::Latitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(InvalidCoordinate::Longitude(self.longitude));
        }
        Ok(())
    }
}

/// A point plus the free-text address a human gave for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(flatten)]
    pub point: GeoPoint,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
}

impl Location {
    pub fn new(point: GeoPoint, address: impl Into<String>) -> Self {
        Self {
            point,
            address: address.into(),
            landmark: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(GeoPoint::new(0.0, 0.0).validate().is_ok());
        assert!(GeoPoint::new(-90.0, 180.0).validate().is_ok());
        assert!(GeoPoint::new(44.98, -93.27).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_latitude() {
        assert_eq!(
            GeoPoint::new(91.0, 0.0).validate(),
            Err(InvalidCoordinate::Latitude(91.0))
        );
    }

    #[test]
    fn test_out_of_range_longitude() {
        assert_eq!(
            GeoPoint::new(0.0, -180.5).validate(),
            Err(InvalidCoordinate::Longitude(-180.5))
        );
    }

    #[test]
    fn test_nan_rejected() {
        assert!(GeoPoint::new(f64::NAN, 0.0).validate().is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_location_flattens_point() {
        let location = Location::new(GeoPoint::new(1.5, 2.5), "Main St");
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["latitude"], 1.5);
        assert_eq!(json["longitude"], 2.5);
        assert_eq!(json["address"], "Main St");
        assert!(json.get("landmark").is_none());
    }
}
