use std::fmt;
use std::str::FromStr;

use crate::common::{RequestId, RequesterId, ResponderId};

/// Delivery address for outbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Everything addressed to one requester
    Requester(RequesterId),
    /// Everything addressed to one responder
    Responder(ResponderId),
    /// Tracking feed for one request (requester app, operators)
    Request(RequestId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Requester(id) => write!(f, "requester:{}", id),
            Topic::Responder(id) => write!(f, "responder:{}", id),
            Topic::Request(id) => write!(f, "request:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct InvalidTopic(pub String);

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTopic(s.to_string());
        let (prefix, id) = s.split_once(':').ok_or_else(invalid)?;
        match prefix {
            "requester" => id.parse().map(Topic::Requester).map_err(|_| invalid()),
            "responder" => id.parse().map(Topic::Responder).map_err(|_| invalid()),
            "request" => id.parse().map(Topic::Request).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}
