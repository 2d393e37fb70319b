use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::{HospitalId, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    Cardiology,
    Neurology,
    TraumaCenter,
    BurnUnit,
    Orthopedics,
    Pediatrics,
    Gynecology,
    GeneralSurgery,
    Oncology,
    Nephrology,
    Gastroenterology,
    Pulmonology,
    General,
}

impl Specialization {
    /// Human-readable label used in suggestion reasons
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cardiology => "cardiology",
            Self::Neurology => "neurology",
            Self::TraumaCenter => "trauma center",
            Self::BurnUnit => "burn unit",
            Self::Orthopedics => "orthopedics",
            Self::Pediatrics => "pediatrics",
            Self::Gynecology => "gynecology",
            Self::GeneralSurgery => "general surgery",
            Self::Oncology => "oncology",
            Self::Nephrology => "nephrology",
            Self::Gastroenterology => "gastroenterology",
            Self::Pulmonology => "pulmonology",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HospitalTier {
    #[default]
    Government,
    Private,
    Trust,
    Corporate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(setter(into)))]
pub struct Hospital {
    #[builder(default = HospitalId::new())]
    pub id: HospitalId,
    pub name: String,
    pub location: Location,
    #[builder(default)]
    #[serde(default)]
    pub tier: HospitalTier,
    #[builder(default)]
    #[serde(default)]
    pub specializations: Vec<Specialization>,
    /// Free emergency beds
    #[builder(default)]
    #[serde(default)]
    pub available_units: u32,
    #[builder(default)]
    #[serde(default)]
    pub icu_beds_available: u32,
    /// 0.0 - 5.0
    #[builder(default)]
    #[serde(default)]
    pub rating: f64,
}

impl Hospital {
    pub fn offers(&self, specialization: Specialization) -> bool {
        self.specializations.contains(&specialization)
    }
}

/// A directory hit: hospital plus straight-line distance to the query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyHospital {
    pub hospital: Hospital,
    pub distance_meters: f64,
}

/// One ranked destination stored on an emergency request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalSuggestion {
    pub hospital_id: HospitalId,
    pub name: String,
    pub address: String,
    pub distance_meters: f64,
    pub eta_seconds: u64,
    pub score: i64,
    pub reason: String,
}
