//! Scripted stand-in for the gateway side of the link

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use meshuart_shared::{
    codec, ControlPacket, ControlType, MeshAck, MeshCommandPacket, ResultPacket, ResultValue,
};

use crate::bus::{BusEvent, EventBus, MeshFinalAck};
use crate::error::UartError;
use crate::transport::TransportWriter;

/// Replies to one written frame: each event is published after its delay,
/// delays counted from the previous event.
pub type Reply = Vec<(Duration, BusEvent)>;

/// Records written frames and answers each with the next scripted reply.
pub struct ScriptedGateway {
    bus: EventBus,
    frames: Mutex<Vec<Bytes>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedGateway {
    pub fn new(bus: &EventBus, replies: Vec<Reply>) -> Self {
        Self {
            bus: bus.clone(),
            frames: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().unwrap().clone()
    }

    /// Control packets carried by every written frame
    pub fn controls(&self) -> Vec<ControlPacket> {
        self.frames().iter().map(|frame| control_of(frame)).collect()
    }

    /// Mesh commands carried by every written frame
    pub fn mesh_commands(&self) -> Vec<MeshCommandPacket> {
        self.controls()
            .iter()
            .map(|control| {
                assert_eq!(control.control_type(), ControlType::MeshCommand);
                MeshCommandPacket::parse(control.payload()).expect("bad mesh command")
            })
            .collect()
    }
}

#[async_trait]
impl TransportWriter for ScriptedGateway {
    async fn write(&self, frame: Bytes) -> Result<(), UartError> {
        self.frames.lock().unwrap().push(frame);
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_default();

        let bus = self.bus.clone();
        tokio::spawn(async move {
            for (delay, event) in reply {
                tokio::time::sleep(delay).await;
                bus.publish(event);
            }
        });
        Ok(())
    }
}

pub fn control_of(frame: &[u8]) -> ControlPacket {
    let mut buf = BytesMut::from(frame);
    let message = codec::decode(&mut buf)
        .expect("bad frame")
        .expect("incomplete frame");
    ControlPacket::parse(&message.payload).expect("bad control packet")
}

pub fn accepted(command: ControlType, code: ResultValue) -> (Duration, BusEvent) {
    (Duration::ZERO, ResultPacket::new(command, code).into())
}

pub fn mesh_accepted(code: ResultValue) -> (Duration, BusEvent) {
    accepted(ControlType::MeshCommand, code)
}

/// A node acknowledgment 100ms after the previous event
pub fn node_ack(stone_id: u8, code: ResultValue) -> (Duration, BusEvent) {
    let result = ResultPacket::new(ControlType::MeshCommand, code);
    (Duration::from_millis(100), MeshAck::new(stone_id, result).into())
}

pub fn final_ack(code: ResultValue) -> (Duration, BusEvent) {
    let result = ResultPacket::new(ControlType::MeshCommand, code);
    (Duration::from_millis(100), MeshFinalAck(result).into())
}
