//! Broadcast-backed event bus

use std::marker::PhantomData;

use tokio::sync::broadcast;
use tracing::warn;

use super::topics::{BusEvent, Topic, TopicPayload};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Event bus shared by the UART reader and every waiting command.
///
/// Each published event is delivered, in publish order, to every subscription
/// whose topic matches. Subscriptions are independent: two waiters on the same
/// topic both see every event. Every topic has its own channel, so a burst on
/// one topic never pushes unread events of another out of the buffer.
#[derive(Clone)]
pub struct EventBus {
    channels: [broadcast::Sender<BusEvent>; Topic::COUNT],
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified capacity per topic.
    ///
    /// The capacity determines how many events are buffered for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let channels = std::array::from_fn(|_| broadcast::channel(capacity).0);
        Self { channels }
    }

    fn channel(&self, topic: Topic) -> &broadcast::Sender<BusEvent> {
        &self.channels[topic.index()]
    }

    /// Get the number of current subscriptions, across all topics.
    pub fn subscriber_count(&self) -> usize {
        self.channels.iter().map(|tx| tx.receiver_count()).sum()
    }

    /// Publish an event.
    ///
    /// Returns `true` if there was at least one subscription to its topic.
    /// Publishing into a topic nobody listens to simply drops the event.
    pub fn publish(&self, event: impl Into<BusEvent>) -> bool {
        let event = event.into();
        self.channel(event.topic()).send(event).is_ok()
    }

    /// Subscribe to the topic of payload type `T`.
    ///
    /// Only events published after this call are observed. Dropping the
    /// subscription unsubscribes.
    pub fn subscribe<T: TopicPayload>(&self) -> Subscription<T> {
        Subscription {
            rx: self.channel(T::TOPIC).subscribe(),
            filter: None,
            _payload: PhantomData,
        }
    }

    /// Subscribe to the topic of `T`, keeping only payloads accepted by `filter`.
    pub fn subscribe_filtered<T, F>(&self, filter: F) -> Subscription<T>
    where
        T: TopicPayload,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Subscription {
            rx: self.channel(T::TOPIC).subscribe(),
            filter: Some(Box::new(filter)),
            _payload: PhantomData,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to one topic.
pub struct Subscription<T> {
    rx: broadcast::Receiver<BusEvent>,
    filter: Option<Filter<T>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: TopicPayload> Subscription<T> {
    fn accept(&self, event: BusEvent) -> Option<T> {
        if event.topic() != T::TOPIC {
            return None;
        }
        let payload = T::from_event(event)?;
        match &self.filter {
            Some(filter) if !filter(&payload) => None,
            _ => Some(payload),
        }
    }

    /// Receive the next matching payload.
    ///
    /// Returns `None` if the event bus is closed. Cancel safe.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(payload) = self.accept(event) {
                        return Some(payload);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("{} subscriber lagged, {} events dropped", T::TOPIC, missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next matching payload that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(payload) = self.accept(event) {
                        return Some(payload);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Discard everything queued so far; returns how many matching payloads were dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_recv().is_some() {
            dropped += 1;
        }
        dropped
    }
}
