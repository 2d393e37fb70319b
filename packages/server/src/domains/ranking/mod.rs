pub mod models;
pub mod recommender;
pub mod utils;

pub use models::{Hospital, HospitalSuggestion, HospitalTier, NearbyHospital, Specialization};
pub use recommender::HospitalRecommender;
