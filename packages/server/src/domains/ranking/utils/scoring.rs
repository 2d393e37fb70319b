//! Pure scoring rules for hospital suggestions
//!
//! These functions contain NO side effects. Given a candidate's attributes
//! and the emergency classification they produce a deterministic integer
//! score and a human-readable reason.

use crate::domains::dispatch::models::EmergencyType;
use crate::domains::ranking::models::{Hospital, HospitalTier, Specialization};

pub const BASE_SCORE: f64 = 100.0;
pub const MAX_DISTANCE_POINTS: f64 = 30.0;
pub const IDEAL_SPECIALIZATION_POINTS: f64 = 25.0;
pub const GENERAL_CAPABILITY_POINTS: f64 = 10.0;
pub const MAX_CAPACITY_POINTS: f64 = 20.0;
pub const RATING_MULTIPLIER: f64 = 3.0;
pub const PUBLIC_TIER_POINTS: f64 = 10.0;
pub const CRITICAL_CAPACITY_POINTS: f64 = 10.0;

pub const DEFAULT_REASON: &str = "Available for emergency care";

// Reason thresholds
const NEAREST_METERS: f64 = 3_000.0;
const GOOD_CAPACITY_UNITS: u32 = 5;
const HIGH_RATING: f64 = 4.0;

/// Attributes the scorer looks at. Kept separate from [`Hospital`] so the
/// same rules can score anything with these properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringInput {
    pub distance_meters: f64,
    pub ideal_match: Option<Specialization>,
    pub has_general: bool,
    pub available_units: u32,
    pub rating: f64,
    pub public_tier: bool,
    pub critical_capacity: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub value: i64,
    pub reason: String,
}

/// Specialization that best fits an emergency, if there is one.
pub fn ideal_specialization(emergency: EmergencyType) -> Option<Specialization> {
    use EmergencyType::*;
    match emergency {
        HeartAttack => Some(Specialization::Cardiology),
        Stroke | Seizure => Some(Specialization::Neurology),
        RoadAccident | Trauma => Some(Specialization::TraumaCenter),
        Burns => Some(Specialization::BurnUnit),
        BreathingDifficulty => Some(Specialization::Pulmonology),
        PregnancyEmergency => Some(Specialization::Gynecology),
        Poisoning | Other => None,
    }
}

/// Specializations that qualify a hospital on the primary search pass.
pub fn accepted_specializations(emergency: EmergencyType) -> &'static [Specialization] {
    use EmergencyType::*;
    use Specialization as S;
    match emergency {
        HeartAttack => &[S::Cardiology, S::General],
        Stroke | Seizure => &[S::Neurology, S::General],
        RoadAccident => &[S::TraumaCenter, S::Orthopedics, S::General],
        Trauma => &[S::TraumaCenter, S::General],
        Burns => &[S::BurnUnit, S::General],
        BreathingDifficulty => &[S::Pulmonology, S::General],
        PregnancyEmergency => &[S::Gynecology, S::General],
        Poisoning | Other => &[S::General],
    }
}

pub fn scoring_input(hospital: &Hospital, distance_meters: f64, emergency: EmergencyType) -> ScoringInput {
    ScoringInput {
        distance_meters,
        ideal_match: ideal_specialization(emergency).filter(|s| hospital.offers(*s)),
        has_general: hospital.offers(Specialization::General),
        available_units: hospital.available_units,
        rating: hospital.rating,
        public_tier: hospital.tier == HospitalTier::Government,
        critical_capacity: hospital.icu_beds_available > 0,
    }
}

/// Score one candidate.
///
/// # Examples
/// ```
/// use dispatch_core::domains::ranking::models::Specialization;
/// use dispatch_core::domains::ranking::utils::scoring::{score, ScoringInput};
///
/// let best = ScoringInput {
///     distance_meters: 0.0,
///     ideal_match: Some(Specialization::Cardiology),
///     has_general: false,
///     available_units: 5,
///     rating: 5.0,
///     public_tier: true,
///     critical_capacity: true,
/// };
/// assert_eq!(score(&best).value, 200);
/// ```
pub fn score(input: &ScoringInput) -> Score {
    let mut total = BASE_SCORE;

    total += (MAX_DISTANCE_POINTS - (input.distance_meters / 1000.0) * 2.0).max(0.0);

    if input.ideal_match.is_some() {
        total += IDEAL_SPECIALIZATION_POINTS;
    } else if input.has_general {
        total += GENERAL_CAPABILITY_POINTS;
    }

    total += (input.available_units as f64 * 2.0).min(MAX_CAPACITY_POINTS);
    total += input.rating.clamp(0.0, 5.0) * RATING_MULTIPLIER;

    if input.public_tier {
        total += PUBLIC_TIER_POINTS;
    }
    if input.critical_capacity {
        total += CRITICAL_CAPACITY_POINTS;
    }

    Score {
        value: total.round() as i64,
        reason: reason(input),
    }
}

fn reason(input: &ScoringInput) -> String {
    let mut reasons: Vec<String> = Vec::new();

    if let Some(spec) = input.ideal_match {
        reasons.push(format!("Specialized in {}", spec.label()));
    }
    if input.distance_meters < NEAREST_METERS {
        reasons.push("Nearest hospital".to_string());
    }
    if input.available_units >= GOOD_CAPACITY_UNITS {
        reasons.push("Good bed availability".to_string());
    }
    if input.rating >= HIGH_RATING {
        reasons.push("Highly rated".to_string());
    }
    if input.public_tier {
        reasons.push("Government facility".to_string());
    }

    if reasons.is_empty() {
        DEFAULT_REASON.to_string()
    } else {
        reasons.join(", ")
    }
}

/// Sort scored items best-first. Stable: equal scores keep input order.
pub fn rank_by_score<T>(items: &mut [(T, Score)]) {
    items.sort_by(|a, b| b.1.value.cmp(&a.1.value));
}
