pub mod event_gateway;
pub mod topic;

pub use event_gateway::{DispatchHub, EventGateway};
pub use topic::{InvalidTopic, Topic};
