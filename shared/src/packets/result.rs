//! Result packets sent back by the gateway

use bytes::Bytes;

use super::control::CONTROL_PROTOCOL;
use super::Reader;
use crate::codec::CodecError;
use crate::types::{ControlType, ResultValue};

/// `[ protocol: u8 ][ command type: u16 ][ result code: u16 ][ size: u16 ][ payload ]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPacket {
    pub protocol: u8,
    /// Raw command type, kept as-is so results for unknown commands still parse
    pub command_type: u16,
    pub result: ResultValue,
    pub payload: Bytes,
}

impl ResultPacket {
    pub fn new(command_type: ControlType, result: ResultValue) -> Self {
        Self {
            protocol: CONTROL_PROTOCOL,
            command_type: command_type.into(),
            result,
            payload: Bytes::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Whether this result answers a command of the given type
    pub fn is_for(&self, control_type: ControlType) -> bool {
        self.command_type == u16::from(control_type)
    }

    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        Self::read(&mut Reader::new(data))
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let protocol = reader.u8()?;
        let command_type = reader.u16()?;
        let result = ResultValue::from(reader.u16()?);
        let size = reader.u16()? as usize;
        let payload = Bytes::copy_from_slice(reader.bytes(size)?);
        Ok(Self {
            protocol,
            command_type,
            result,
            payload,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(7 + self.payload.len());
        out.push(self.protocol);
        out.extend_from_slice(&self.command_type.to_le_bytes());
        out.extend_from_slice(&u16::from(self.result).to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Acknowledgment from a single mesh node: `[ stone id: u8 ][ result packet ]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshAck {
    pub stone_id: u8,
    pub result: ResultPacket,
}

impl MeshAck {
    pub fn new(stone_id: u8, result: ResultPacket) -> Self {
        Self { stone_id, result }
    }

    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(data);
        let stone_id = reader.u8()?;
        let result = ResultPacket::read(&mut reader)?;
        Ok(Self { stone_id, result })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![self.stone_id];
        out.extend_from_slice(&self.result.serialize());
        out
    }

    pub fn is_success(&self) -> bool {
        self.result.result.is_success()
    }
}
