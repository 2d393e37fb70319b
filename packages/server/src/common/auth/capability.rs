use serde::{Deserialize, Serialize};

/// Things a party can try to do to an existing dispatch session.
///
/// Accepting an offer is not listed here: whether a responder may accept
/// depends on the offer set, which only the session manager knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchCapability {
    /// Move the request forward along the ride lifecycle
    AdvanceStatus,

    /// Cancel the request
    Cancel,

    /// Choose the destination hospital
    SelectDestination,

    /// Rate the completed service
    Rate,

    /// Bind a specific responder without an offer
    AssignResponder,
}

impl DispatchCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdvanceStatus => "advance_status",
            Self::Cancel => "cancel",
            Self::SelectDestination => "select_destination",
            Self::Rate => "rate",
            Self::AssignResponder => "assign_responder",
        }
    }
}
