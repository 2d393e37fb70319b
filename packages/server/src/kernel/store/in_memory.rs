use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::common::{RequestId, ResponderId};
use crate::domains::dispatch::models::{EmergencyRequest, OfferBroadcast, RequestStatus};
use crate::domains::presence::models::ResponderPresence;
use crate::kernel::BaseDispatchStore;

/// Store used by tests and by deployments without `DATABASE_URL`.
#[derive(Default)]
pub struct InMemoryDispatchStore {
    requests: DashMap<RequestId, EmergencyRequest>,
    offers: DashMap<RequestId, OfferBroadcast>,
    responders: DashMap<ResponderId, ResponderPresence>,
}

impl InMemoryDispatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }
}

#[async_trait]
impl BaseDispatchStore for InMemoryDispatchStore {
    async fn save_request(&self, request: &EmergencyRequest) -> Result<()> {
        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn load_request(&self, id: RequestId) -> Result<Option<EmergencyRequest>> {
        Ok(self.requests.get(&id).map(|r| r.value().clone()))
    }

    async fn load_searching_requests(&self) -> Result<Vec<EmergencyRequest>> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Searching)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn save_offer(&self, offer: &OfferBroadcast) -> Result<()> {
        self.offers.insert(offer.request_id, offer.clone());
        Ok(())
    }

    async fn load_offer(&self, request_id: RequestId) -> Result<Option<OfferBroadcast>> {
        Ok(self.offers.get(&request_id).map(|o| o.value().clone()))
    }

    async fn delete_offer(&self, request_id: RequestId) -> Result<()> {
        self.offers.remove(&request_id);
        Ok(())
    }

    async fn save_responder(&self, responder: &ResponderPresence) -> Result<()> {
        self.responders.insert(responder.id, responder.clone());
        Ok(())
    }

    async fn load_responders(&self) -> Result<Vec<ResponderPresence>> {
        Ok(self.responders.iter().map(|r| r.value().clone()).collect())
    }
}
