//! Offer deadlines.
//!
//! One cancellable delayed task per searching request. The task races a
//! sleep against the request's [`CancellationToken`]; whichever resolves
//! first wins. Accept, assignment and cancellation disarm the deadline, so
//! a resolved request never sees its expiry side effects.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::RequestId;

#[derive(Clone, Default)]
pub struct OfferDeadlines {
    armed: Arc<RwLock<HashMap<RequestId, CancellationToken>>>,
}

impl OfferDeadlines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_expiry` after `after` unless disarmed first.
    ///
    /// Re-arming a request cancels its previous deadline.
    pub async fn arm<F>(&self, request_id: RequestId, after: Duration, on_expiry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.armed.write().await.insert(request_id, token.clone()) {
            previous.cancel();
        }

        let armed = self.armed.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(request_id = %request_id, "offer deadline disarmed");
                }
                _ = tokio::time::sleep(after) => {
                    armed.write().await.remove(&request_id);
                    debug!(request_id = %request_id, "offer deadline fired");
                    on_expiry.await;
                }
            }
        });
    }

    /// Cancel the pending deadline. Returns whether one was armed.
    pub async fn disarm(&self, request_id: RequestId) -> bool {
        match self.armed.write().await.remove(&request_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_armed(&self, request_id: RequestId) -> bool {
        self.armed.read().await.contains_key(&request_id)
    }

    /// Cancel every pending deadline (shutdown).
    pub async fn disarm_all(&self) -> usize {
        let mut armed = self.armed.write().await;
        let count = armed.len();
        for (_, token) in armed.drain() {
            token.cancel();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_deadline() {
        let deadlines = OfferDeadlines::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = RequestId::new();

        let counter = fired.clone();
        deadlines
            .arm(id, Duration::from_secs(120), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!deadlines.is_armed(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_deadline_never_fires() {
        let deadlines = OfferDeadlines::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = RequestId::new();

        let counter = fired.clone();
        deadlines
            .arm(id, Duration::from_secs(120), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(deadlines.disarm(id).await);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!deadlines.disarm(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_all() {
        let deadlines = OfferDeadlines::new();
        for _ in 0..3 {
            deadlines
                .arm(RequestId::new(), Duration::from_secs(10), async {})
                .await;
        }
        assert_eq!(deadlines.disarm_all().await, 3);
    }
}
