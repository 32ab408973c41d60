//! Topic-keyed event bus for inbound gateway traffic
//!
//! Everything the gateway reports arrives here as an unrelated event. Nothing
//! ties a response to the command that caused it; the collectors built on top of
//! this bus do the correlating.

mod event_bus;
mod topics;

pub use event_bus::{EventBus, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use topics::{BusEvent, HelloPacket, LogPacket, MeshFinalAck, Topic, TopicPayload};
