//! Pure transition rules for the request lifecycle.
//!
//! No I/O and no locking here; the session manager calls these while it
//! holds the request's lock and maps the results into errors.

use crate::domains::dispatch::models::RequestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// Manual ride step requested by the bound responder or an operator.
///
/// Only the single next step of the ride chain is legal: no skipping, no
/// going back, no re-entering the current state.
pub fn check_advance(from: RequestStatus, to: RequestStatus) -> Result<(), IllegalTransition> {
    match from.next_ride_step() {
        Some(next) if next == to => Ok(()),
        _ => Err(IllegalTransition { from, to }),
    }
}

/// Cancellation is open from every state except the terminal ones.
pub fn check_cancel(from: RequestStatus) -> Result<(), IllegalTransition> {
    if from.is_terminal() {
        Err(IllegalTransition {
            from,
            to: RequestStatus::Cancelled,
        })
    } else {
        Ok(())
    }
}

/// Binding a responder (offer accept or operator assignment).
pub fn check_bind(from: RequestStatus) -> Result<(), IllegalTransition> {
    match from {
        RequestStatus::Pending | RequestStatus::Searching => Ok(()),
        _ => Err(IllegalTransition {
            from,
            to: RequestStatus::Accepted,
        }),
    }
}

/// Only a searching request can run out of responders.
pub fn check_exhausted(from: RequestStatus) -> Result<(), IllegalTransition> {
    if from == RequestStatus::Searching {
        Ok(())
    } else {
        Err(IllegalTransition {
            from,
            to: RequestStatus::NoResponderAvailable,
        })
    }
}

/// Destination may be chosen once a responder is on the job and the ride
/// is still live.
pub fn destination_selectable(status: RequestStatus) -> bool {
    status.has_responder() && !status.is_terminal()
}
