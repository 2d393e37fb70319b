pub mod deadlines;
pub mod session;

pub use deadlines::OfferDeadlines;
pub use session::{RestoreSummary, SessionManager};
