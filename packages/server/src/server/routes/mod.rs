// HTTP routes
pub mod health;
pub mod messages;
pub mod requests;
pub mod responders;
pub mod stream;

pub use health::health_handler;
pub use stream::stream_handler;
