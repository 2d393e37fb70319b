pub mod models;
pub mod presence_index;

pub use models::{Candidate, CandidateQuery};
pub use presence_index::{select_candidates, PresenceGeoIndex};
