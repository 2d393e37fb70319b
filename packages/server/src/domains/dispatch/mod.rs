pub mod commands;
pub mod effects;
pub mod errors;
pub mod events;
pub mod machines;
pub mod models;

pub use commands::{InboundMessage, InboundReply};
pub use effects::{RestoreSummary, SessionManager};
pub use errors::{DispatchError, DispatchResult, ErrorCategory};
pub use events::{DispatchEvent, ResponderSummary};
