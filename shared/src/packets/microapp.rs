//! Microapp management packets

use bytes::Bytes;

use super::control::CONTROL_HEADER_LEN;
use super::Reader;
use crate::codec::{CodecError, MAX_PAYLOAD_LEN};

/// Identifies a microapp slot and the microapp protocol in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MicroappHeader {
    pub protocol: u8,
    pub app_index: u8,
}

impl MicroappHeader {
    pub fn new(app_index: u8, protocol: u8) -> Self {
        Self { protocol, app_index }
    }

    pub fn serialize(&self) -> Vec<u8> {
        vec![self.protocol, self.app_index]
    }
}

/// One chunk of a microapp binary: `[ header ][ offset: u16 ][ data ]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroappUploadPacket {
    pub header: MicroappHeader,
    pub offset: u16,
    pub data: Vec<u8>,
}

impl MicroappUploadPacket {
    /// Largest chunk that still fits in one control frame
    pub const MAX_DATA_LEN: usize = MAX_PAYLOAD_LEN - CONTROL_HEADER_LEN - 4;

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.header.serialize();
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

/// Microapp capabilities reported by the firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroappInfo {
    pub protocol: u8,
    pub max_apps: u8,
    pub max_app_size: u16,
    pub max_chunk_size: u16,
    pub max_ram_usage: u16,
    pub sdk_version: (u8, u8),
    /// Per-app status blocks, left unparsed
    pub app_status: Bytes,
}

impl MicroappInfo {
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(data);
        Ok(Self {
            protocol: reader.u8()?,
            max_apps: reader.u8()?,
            max_app_size: reader.u16()?,
            max_chunk_size: reader.u16()?,
            max_ram_usage: reader.u16()?,
            sdk_version: (reader.u8()?, reader.u8()?),
            app_status: Bytes::copy_from_slice(reader.remaining()),
        })
    }
}
