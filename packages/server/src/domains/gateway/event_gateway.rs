//! Event gateway: the boundary between the dispatch engine and whatever
//! transport delivers events to people.
//!
//! Outbound events go onto [`StreamHub`] topics; SSE handlers (or any other
//! bridge) subscribe to those topics. Inbound JSON is decoded into the typed
//! [`InboundMessage`] and handed to the session manager by the caller. The
//! gateway holds no state beyond the hub's channel buffers.

use tokio::sync::broadcast;
use tracing::debug;

use super::topic::Topic;
use crate::common::{RequestId, RequesterId, ResponderId};
use crate::domains::dispatch::commands::InboundMessage;
use crate::domains::dispatch::errors::{DispatchError, DispatchResult};
use crate::domains::dispatch::events::DispatchEvent;
use crate::domains::dispatch::models::{EmergencyRequest, OfferBroadcast};
use crate::kernel::stream_hub::StreamHub;

pub type DispatchHub = StreamHub<Topic, DispatchEvent>;

#[derive(Clone, Default)]
pub struct EventGateway {
    hub: DispatchHub,
}

impl EventGateway {
    pub fn new(hub: DispatchHub) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &DispatchHub {
        &self.hub
    }

    pub async fn subscribe(&self, topic: Topic) -> broadcast::Receiver<DispatchEvent> {
        self.hub.subscribe(topic).await
    }

    /// Send one `request.offer` to every candidate in the broadcast.
    pub async fn broadcast_offer(&self, request: &EmergencyRequest, offer: &OfferBroadcast) {
        for candidate in &offer.candidates {
            let event = DispatchEvent::Offer {
                request_id: request.id,
                emergency_type: request.emergency_type,
                severity: request.severity,
                responder_class: request.responder_class,
                pickup: request.pickup.clone(),
                distance_meters: candidate.distance_meters,
                deadline: offer.deadline,
            };
            self.notify_responder(candidate.responder_id, event).await;
        }
        debug!(request_id = %request.id, candidates = offer.candidates.len(), "offer broadcast");
    }

    /// Deliver to the requester. The event is mirrored on the request's
    /// tracking topic so operators following the request see it too.
    pub async fn notify_requester(&self, requester_id: RequesterId, event: DispatchEvent) {
        let request_id = event.request_id();
        let reached = self
            .hub
            .publish(&Topic::Requester(requester_id), event.clone())
            .await;
        self.hub.publish(&Topic::Request(request_id), event.clone()).await;
        debug!(request_id = %request_id, requester_id = %requester_id, kind = event.kind(), reached, "requester notified");
    }

    pub async fn notify_responder(&self, responder_id: ResponderId, event: DispatchEvent) {
        let kind = event.kind();
        let reached = self.hub.publish(&Topic::Responder(responder_id), event).await;
        debug!(responder_id = %responder_id, kind, reached, "responder notified");
    }

    pub async fn notify_responders(
        &self,
        responders: impl IntoIterator<Item = ResponderId>,
        event: DispatchEvent,
    ) {
        for responder_id in responders {
            self.notify_responder(responder_id, event.clone()).await;
        }
    }

    /// Publish on the tracking topic only.
    pub async fn publish_tracking(&self, request_id: RequestId, event: DispatchEvent) {
        self.hub.publish(&Topic::Request(request_id), event).await;
    }

    /// Decode one inbound JSON message.
    pub fn decode(raw: serde_json::Value) -> DispatchResult<InboundMessage> {
        serde_json::from_value(raw).map_err(|e| DispatchError::validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requester_events_mirror_to_tracking() {
        let gateway = EventGateway::default();
        let requester = RequesterId::new();
        let request_id = RequestId::new();

        let mut personal = gateway.subscribe(Topic::Requester(requester)).await;
        let mut tracking = gateway.subscribe(Topic::Request(request_id)).await;

        gateway
            .notify_requester(requester, DispatchEvent::Timeout { request_id })
            .await;

        assert_eq!(personal.recv().await.unwrap().kind(), "request.timeout");
        assert_eq!(tracking.recv().await.unwrap().kind(), "request.timeout");
    }

    #[tokio::test]
    async fn test_responder_event_not_seen_by_others() {
        let gateway = EventGateway::default();
        let a = ResponderId::new();
        let b = ResponderId::new();
        let mut rx_b = gateway.subscribe(Topic::Responder(b)).await;

        gateway
            .notify_responder(a, DispatchEvent::OfferTaken { request_id: RequestId::new() })
            .await;

        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let err = EventGateway::decode(serde_json::json!({ "kind": "accept" })).unwrap_err();
        assert_eq!(err.code(), "validation");
    }
}
