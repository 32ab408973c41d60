//! Packet builders and parsers for the payloads carried inside UART messages
//!
//! Builders produce plain byte vectors; the protocol layer never looks inside
//! them, it only wraps them in a UART message.

mod control;
mod mesh;
mod microapp;
mod result;

pub use control::{
    ibeacon_config_id_packet, ibeacon_uuid_to_bytes, set_time_packet, ControlPacket,
    StateSetPacket, CONTROL_HEADER_LEN, CONTROL_PROTOCOL,
};
pub use mesh::{
    MeshCommandKind, MeshCommandPacket, MeshMultiSwitchPacket, StoneSwitch, MAX_MESH_TARGETS,
};
pub use microapp::{MicroappHeader, MicroappInfo, MicroappUploadPacket};
pub use result::{MeshAck, ResultPacket};

use crate::codec::CodecError;

/// Little-endian reader over a received payload
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let available = self.data.len() - self.position;
        if available < len {
            return Err(CodecError::NotEnoughData {
                needed: len,
                available,
            });
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.take(len)
    }

    pub(crate) fn remaining(&mut self) -> &'a [u8] {
        let rest = &self.data[self.position..];
        self.position = self.data.len();
        rest
    }
}
