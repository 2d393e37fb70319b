use serde::{Deserialize, Serialize};

/// Lifecycle of an emergency request.
///
/// The ride states form a single forward chain from `Accepted` to
/// `Completed`. `Cancelled` and `NoResponderAvailable` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Searching,
    Accepted,
    EnRouteToPickup,
    ArrivedAtPickup,
    PatientPicked,
    EnRouteToDestination,
    ArrivedAtDestination,
    Completed,
    Cancelled,
    NoResponderAvailable,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Searching => "searching",
            Self::Accepted => "accepted",
            Self::EnRouteToPickup => "en_route_to_pickup",
            Self::ArrivedAtPickup => "arrived_at_pickup",
            Self::PatientPicked => "patient_picked",
            Self::EnRouteToDestination => "en_route_to_destination",
            Self::ArrivedAtDestination => "arrived_at_destination",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoResponderAvailable => "no_responder_available",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::NoResponderAvailable
        )
    }

    /// Whether a responder must be bound in this state.
    ///
    /// `Cancelled` keeps the reference to whoever was assigned (if anyone),
    /// so it is excluded from both sides of the binding rule.
    pub fn has_responder(&self) -> bool {
        matches!(
            self,
            Self::Accepted
                | Self::EnRouteToPickup
                | Self::ArrivedAtPickup
                | Self::PatientPicked
                | Self::EnRouteToDestination
                | Self::ArrivedAtDestination
                | Self::Completed
        )
    }

    /// The single legal manual step from this state, if any.
    pub fn next_ride_step(&self) -> Option<Self> {
        match self {
            Self::Accepted => Some(Self::EnRouteToPickup),
            Self::EnRouteToPickup => Some(Self::ArrivedAtPickup),
            Self::ArrivedAtPickup => Some(Self::PatientPicked),
            Self::PatientPicked => Some(Self::EnRouteToDestination),
            Self::EnRouteToDestination => Some(Self::ArrivedAtDestination),
            Self::ArrivedAtDestination => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
