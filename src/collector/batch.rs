use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::bus::{EventBus, Subscription, TopicPayload};

/// Waits for successive events on the topic of `T`.
///
/// Every [`receive`](BatchCollector::receive) gets its own full timeout. Call
/// [`cleanup`](BatchCollector::cleanup) once no more events are useful.
pub struct BatchCollector<T> {
    subscription: Subscription<T>,
    timeout: Duration,
}

impl<T: TopicPayload> BatchCollector<T> {
    pub fn new(bus: &EventBus, timeout: Duration) -> Self {
        Self {
            subscription: bus.subscribe(),
            timeout,
        }
    }

    pub fn filtered<F>(bus: &EventBus, timeout: Duration, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            subscription: bus.subscribe_filtered(filter),
            timeout,
        }
    }

    /// Wait for the next unconsumed event, or `None` after the timeout.
    pub async fn receive(&mut self) -> Option<T> {
        self.receive_within(self.timeout).await
    }

    /// [`receive`](BatchCollector::receive) with a one-off timeout.
    pub async fn receive_within(&mut self, limit: Duration) -> Option<T> {
        match timeout(limit, self.subscription.recv()).await {
            Ok(payload) => payload,
            Err(_) => {
                debug!("No {} within {:?}", T::TOPIC, limit);
                None
            }
        }
    }

    /// Discard events that arrived but were not received yet.
    pub fn clear(&mut self) {
        let dropped = self.subscription.drain();
        if dropped > 0 {
            debug!("Discarded {} stale {} events", dropped, T::TOPIC);
        }
    }

    /// Unsubscribe for good.
    pub fn cleanup(self) {}
}
