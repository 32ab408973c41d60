//! Topics and their payloads

use bytes::Bytes;
use meshuart_shared::{MeshAck, ResultPacket, UartMessage};

/// Topics published on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Gateway accepted, rejected or was busy with a command
    ResultPacket,
    /// One mesh node acknowledged a mesh command
    MeshResult,
    /// Gateway's verdict on a whole acknowledged mesh command
    MeshResultFinal,
    /// Every decoded inbound message, unparsed
    UartMessage,
    Hello,
    Log,
}

impl Topic {
    pub const COUNT: usize = 6;

    /// Position of this topic's channel on the bus
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Topic::ResultPacket => "result packet",
            Topic::MeshResult => "mesh result",
            Topic::MeshResultFinal => "final mesh result",
            Topic::UartMessage => "uart message",
            Topic::Hello => "hello",
            Topic::Log => "log",
        };
        f.write_str(name)
    }
}

/// Final acknowledgment of an acknowledged mesh command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshFinalAck(pub ResultPacket);

impl MeshFinalAck {
    pub fn is_success(&self) -> bool {
        self.0.result.is_success()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloPacket {
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPacket {
    pub payload: Bytes,
}

/// An event as carried by the bus
#[derive(Debug, Clone)]
pub enum BusEvent {
    Result(ResultPacket),
    MeshAck(MeshAck),
    MeshFinal(MeshFinalAck),
    Message(UartMessage),
    Hello(HelloPacket),
    Log(LogPacket),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::Result(_) => Topic::ResultPacket,
            BusEvent::MeshAck(_) => Topic::MeshResult,
            BusEvent::MeshFinal(_) => Topic::MeshResultFinal,
            BusEvent::Message(_) => Topic::UartMessage,
            BusEvent::Hello(_) => Topic::Hello,
            BusEvent::Log(_) => Topic::Log,
        }
    }
}

/// A payload type bound to exactly one topic
pub trait TopicPayload: Clone + Send + 'static {
    const TOPIC: Topic;

    fn from_event(event: BusEvent) -> Option<Self>;

    fn into_event(self) -> BusEvent;
}

macro_rules! topic_payload {
    ($payload:ty, $topic:ident, $variant:ident) => {
        impl TopicPayload for $payload {
            const TOPIC: Topic = Topic::$topic;

            fn from_event(event: BusEvent) -> Option<Self> {
                match event {
                    BusEvent::$variant(payload) => Some(payload),
                    _ => None,
                }
            }

            fn into_event(self) -> BusEvent {
                BusEvent::$variant(self)
            }
        }

        impl From<$payload> for BusEvent {
            fn from(payload: $payload) -> Self {
                BusEvent::$variant(payload)
            }
        }
    };
}

topic_payload!(ResultPacket, ResultPacket, Result);
topic_payload!(MeshAck, MeshResult, MeshAck);
topic_payload!(MeshFinalAck, MeshResultFinal, MeshFinal);
topic_payload!(UartMessage, UartMessage, Message);
topic_payload!(HelloPacket, Hello, Hello);
topic_payload!(LogPacket, Log, Log);
