use serde::{Deserialize, Serialize};

use super::{AuthError, DispatchCapability};
use crate::common::entity_ids::{OperatorId, RequesterId, ResponderId};

/// The party acting on a dispatch session.
///
/// Every inbound message carries one; the transport layer is trusted to have
/// authenticated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Requester(RequesterId),
    Responder(ResponderId),
    Operator(OperatorId),
}

/// Who owns a session, as far as authorization is concerned.
#[derive(Debug, Clone, Copy)]
pub struct SessionParties {
    pub requester: RequesterId,
    pub responder: Option<ResponderId>,
}

impl Actor {
    /// Specify what capability the actor needs
    ///
    /// ```
    /// use dispatch_core::common::{Actor, DispatchCapability, RequesterId, SessionParties};
    ///
    /// let requester = RequesterId::new();
    /// let parties = SessionParties { requester, responder: None };
    ///
    /// assert!(Actor::Requester(requester)
    ///     .can(DispatchCapability::Cancel)
    ///     .on(parties)
    ///     .check()
    ///     .is_ok());
    /// ```
    pub fn can(self, capability: DispatchCapability) -> CapabilityBuilder {
        CapabilityBuilder {
            actor: self,
            capability,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Actor::Operator(_))
    }
}

/// Builder after specifying capability
pub struct CapabilityBuilder {
    actor: Actor,
    capability: DispatchCapability,
}

impl CapabilityBuilder {
    /// Bind the check to a concrete session
    pub fn on(self, parties: SessionParties) -> SessionCheck {
        SessionCheck {
            actor: self.actor,
            capability: self.capability,
            parties,
        }
    }
}

pub struct SessionCheck {
    actor: Actor,
    capability: DispatchCapability,
    parties: SessionParties,
}

impl SessionCheck {
    /// Perform the authorization check
    pub fn check(self) -> Result<(), AuthError> {
        use DispatchCapability::*;

        let is_requester = matches!(self.actor, Actor::Requester(id) if id == self.parties.requester);
        let is_bound_responder = match (self.actor, self.parties.responder) {
            (Actor::Responder(id), Some(bound)) => id == bound,
            _ => false,
        };
        let is_operator = self.actor.is_operator();

        let allowed = match self.capability {
            AdvanceStatus => is_bound_responder || is_operator,
            Cancel => is_requester || is_operator,
            SelectDestination => is_requester || is_bound_responder || is_operator,
            Rate => is_requester,
            AssignResponder => is_operator,
        };

        if allowed {
            return Ok(());
        }

        let reason = match self.capability {
            AdvanceStatus => "only the assigned responder or an operator may advance status",
            Cancel => "only the requester or an operator may cancel",
            SelectDestination => "only session parties may choose the destination",
            Rate => "only the requester may rate the service",
            AssignResponder => "only an operator may assign a responder",
        };
        Err(AuthError::denied(self.capability, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parties() -> (SessionParties, RequesterId, ResponderId) {
        let requester = RequesterId::new();
        let responder = ResponderId::new();
        (
            SessionParties {
                requester,
                responder: Some(responder),
            },
            requester,
            responder,
        )
    }

    #[test]
    fn test_bound_responder_can_advance() {
        let (p, _, responder) = parties();
        assert!(Actor::Responder(responder)
            .can(DispatchCapability::AdvanceStatus)
            .on(p)
            .check()
            .is_ok());
    }

    #[test]
    fn test_other_responder_cannot_advance() {
        let (p, _, _) = parties();
        let err = Actor::Responder(ResponderId::new())
            .can(DispatchCapability::AdvanceStatus)
            .on(p)
            .check()
            .unwrap_err();
        assert!(err.to_string().contains("advance_status"));
    }

    #[test]
    fn test_requester_cannot_advance() {
        let (p, requester, _) = parties();
        assert!(Actor::Requester(requester)
            .can(DispatchCapability::AdvanceStatus)
            .on(p)
            .check()
            .is_err());
    }

    #[test]
    fn test_operator_can_do_everything_but_rate() {
        let (p, _, _) = parties();
        let operator = Actor::Operator(OperatorId::new());
        for cap in [
            DispatchCapability::AdvanceStatus,
            DispatchCapability::Cancel,
            DispatchCapability::SelectDestination,
            DispatchCapability::AssignResponder,
        ] {
            assert!(operator.can(cap).on(p).check().is_ok(), "{:?}", cap);
        }
        assert!(operator
            .can(DispatchCapability::Rate)
            .on(p)
            .check()
            .is_err());
    }

    #[test]
    fn test_cancel_by_stranger_denied() {
        let (p, _, _) = parties();
        assert!(Actor::Requester(RequesterId::new())
            .can(DispatchCapability::Cancel)
            .on(p)
            .check()
            .is_err());
    }

    #[test]
    fn test_unbound_session_has_no_responder_party() {
        let requester = RequesterId::new();
        let p = SessionParties {
            requester,
            responder: None,
        };
        assert!(Actor::Responder(ResponderId::new())
            .can(DispatchCapability::SelectDestination)
            .on(p)
            .check()
            .is_err());
    }

    #[test]
    fn test_actor_json_shape() {
        let id = OperatorId::new();
        let json = serde_json::to_value(Actor::Operator(id)).unwrap();
        assert_eq!(json["role"], "operator");
        assert_eq!(json["id"], id.to_string());
    }
}
