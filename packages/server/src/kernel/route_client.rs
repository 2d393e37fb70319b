use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::BaseRouteProvider;
use crate::common::GeoPoint;
use crate::domains::routing::RouteLeg;

/// OpenRouteService directions client (driving-car profile)
pub struct OpenRouteServiceClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

/// Directions request body. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Serialize)]
struct DirectionsRequest {
    coordinates: [[f64; 2]; 2],
    preference: &'static str,
    instructions: bool,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    summary: RouteSummaryDto,
    /// Encoded polyline
    #[serde(default)]
    geometry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteSummaryDto {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

impl OpenRouteServiceClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl BaseRouteProvider for OpenRouteServiceClient {
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteLeg> {
        let request = DirectionsRequest {
            coordinates: [
                [origin.longitude, origin.latitude],
                [destination.longitude, destination.latitude],
            ],
            preference: "fastest",
            instructions: false,
        };

        let response = self
            .client
            .post(format!("{}/v2/directions/driving-car/json", self.base_url))
            .header("Authorization", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send directions request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouteService error {}: {}", status, body);
        }

        let directions: DirectionsResponse = response
            .json()
            .await
            .context("Failed to parse directions response")?;

        let route = directions
            .routes
            .into_iter()
            .next()
            .context("Directions response contained no routes")?;

        Ok(RouteLeg {
            distance_meters: route.summary.distance,
            duration_seconds: route.summary.duration,
            encoded_path: route.geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_lon_lat_order() {
        let body = DirectionsRequest {
            coordinates: [[-93.27, 44.98], [-93.09, 44.95]],
            preference: "fastest",
            instructions: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["coordinates"][0][0], -93.27);
        assert_eq!(json["coordinates"][0][1], 44.98);
    }

    #[test]
    fn test_parse_directions_response() {
        let raw = r#"{
            "routes": [{
                "summary": { "distance": 15234.5, "duration": 1102.3 },
                "geometry": "_p~iF~ps|U_ulLnnqC"
            }]
        }"#;
        let parsed: DirectionsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.routes[0].summary.distance, 15234.5);
        assert_eq!(parsed.routes[0].geometry.as_deref(), Some("_p~iF~ps|U_ulLnnqC"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenRouteServiceClient::new(
            "key".into(),
            "https://ors.example/".into(),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://ors.example");
    }
}
