use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::bus::{EventBus, Subscription, TopicPayload};

/// Waits for the next event on the topic of `T`.
///
/// The subscription starts at construction, so create the collector before
/// sending the command whose response it should catch.
pub struct Collector<T> {
    subscription: Subscription<T>,
    timeout: Duration,
}

impl<T: TopicPayload> Collector<T> {
    pub fn new(bus: &EventBus, timeout: Duration) -> Self {
        Self {
            subscription: bus.subscribe(),
            timeout,
        }
    }

    /// Like [`Collector::new`], but events rejected by `filter` are not counted.
    pub fn filtered<F>(bus: &EventBus, timeout: Duration, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            subscription: bus.subscribe_filtered(filter),
            timeout,
        }
    }

    /// Resolve with the next event, or `None` once the timeout elapses.
    ///
    /// Consumes the collector, which unsubscribes it.
    pub async fn receive(mut self) -> Option<T> {
        match timeout(self.timeout, self.subscription.recv()).await {
            Ok(payload) => payload,
            Err(_) => {
                debug!("No {} within {:?}", T::TOPIC, self.timeout);
                None
            }
        }
    }
}
