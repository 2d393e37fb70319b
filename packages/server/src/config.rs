use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::presence::models::ServiceTier;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store is used
    pub database_url: Option<String>,
    pub port: u16,
    pub ors_api_key: Option<String>,
    pub ors_base_url: String,
    pub allowed_origins: Vec<String>,
    /// JSON array of hospitals loaded into the directory at startup
    pub hospitals_file: Option<String>,
    pub dispatch: DispatchConfig,
}

/// Tunables for the dispatch engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub public_search_radius_meters: f64,
    pub private_search_radius_meters: f64,
    pub offer_timeout: Duration,
    pub average_speed_mps: f64,
    /// Upper bound on any route, geo or store call in the dispatch path
    pub dependency_timeout: Duration,
    pub max_candidates: usize,
    pub max_hospital_suggestions: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            public_search_radius_meters: 10_000.0,
            private_search_radius_meters: 20_000.0,
            offer_timeout: Duration::from_secs(120),
            average_speed_mps: 10.0,
            dependency_timeout: Duration::from_secs(10),
            max_candidates: 10,
            max_hospital_suggestions: 5,
        }
    }
}

impl DispatchConfig {
    /// Primary search radius for a request of the given tier
    pub fn search_radius(&self, tier: ServiceTier) -> f64 {
        match tier {
            ServiceTier::Public => self.public_search_radius_meters,
            ServiceTier::Private => self.private_search_radius_meters,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = DispatchConfig::default();

        let dispatch = DispatchConfig {
            public_search_radius_meters: parse_or(
                "PUBLIC_SEARCH_RADIUS_METERS",
                defaults.public_search_radius_meters,
            )?,
            private_search_radius_meters: parse_or(
                "PRIVATE_SEARCH_RADIUS_METERS",
                defaults.private_search_radius_meters,
            )?,
            offer_timeout: Duration::from_secs(parse_or(
                "OFFER_TIMEOUT_SECS",
                defaults.offer_timeout.as_secs(),
            )?),
            average_speed_mps: parse_or("AVERAGE_SPEED_MPS", defaults.average_speed_mps)?,
            dependency_timeout: Duration::from_secs(parse_or(
                "DEPENDENCY_TIMEOUT_SECS",
                defaults.dependency_timeout.as_secs(),
            )?),
            max_candidates: parse_or("MAX_CANDIDATES", defaults.max_candidates)?,
            max_hospital_suggestions: parse_or(
                "MAX_HOSPITAL_SUGGESTIONS",
                defaults.max_hospital_suggestions,
            )?,
        };

        if dispatch.average_speed_mps <= 0.0 {
            anyhow::bail!("AVERAGE_SPEED_MPS must be positive");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            ors_api_key: env::var("ORS_API_KEY").ok().filter(|s| !s.is_empty()),
            ors_base_url: env::var("ORS_BASE_URL")
                .unwrap_or_else(|_| "https://api.openrouteservice.org".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            hospitals_file: env::var("HOSPITALS_FILE").ok().filter(|s| !s.is_empty()),
            dispatch,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
