//! Control packets: the command container every gateway command travels in

use super::Reader;
use crate::codec::CodecError;
use crate::types::{ControlType, StateType};

/// Control packet protocol version
pub const CONTROL_PROTOCOL: u8 = 5;

/// protocol + type + size
pub const CONTROL_HEADER_LEN: usize = 5;

/// Persist the new state value across reboots
const PERSISTENCE_STORED: u8 = 1;

/// `[ protocol: u8 ][ type: u16 ][ size: u16 ][ payload ]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPacket {
    control_type: ControlType,
    payload: Vec<u8>,
}

impl ControlPacket {
    pub fn new(control_type: ControlType) -> Self {
        Self {
            control_type,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload.extend_from_slice(payload);
        self
    }

    pub fn with_u16(mut self, value: u16) -> Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn with_u32(mut self, value: u32) -> Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(data);
        let protocol = reader.u8()?;
        if protocol != CONTROL_PROTOCOL {
            return Err(CodecError::UnknownValue {
                kind: "control protocol",
                value: protocol as u16,
            });
        }
        let control_type = ControlType::try_from(reader.u16()?)?;
        let size = reader.u16()? as usize;
        let payload = reader.bytes(size)?.to_vec();
        Ok(Self {
            control_type,
            payload,
        })
    }

    /// A payload longer than [`MAX_PAYLOAD_LEN`](crate::codec::MAX_PAYLOAD_LEN) is rejected when framed.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CONTROL_HEADER_LEN + self.payload.len());
        out.push(CONTROL_PROTOCOL);
        out.extend_from_slice(&u16::from(self.control_type).to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Set-state control packet
///
/// Payload: `[ state type: u16 ][ id: u8 ][ persistence: u8 ][ reserved: u8 ][ value ]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSetPacket {
    state_type: StateType,
    id: u8,
    value: Vec<u8>,
}

impl StateSetPacket {
    /// `id` selects the slot for indexed state (e.g. iBeacon payload 0 or 1)
    pub fn new(state_type: StateType, id: u8) -> Self {
        Self {
            state_type,
            id,
            value: Vec::new(),
        }
    }

    pub fn with_bytes(mut self, value: &[u8]) -> Self {
        self.value.extend_from_slice(value);
        self
    }

    pub fn with_u16(mut self, value: u16) -> Self {
        self.value.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn into_control(self) -> ControlPacket {
        let mut payload = Vec::with_capacity(5 + self.value.len());
        payload.extend_from_slice(&u16::from(self.state_type).to_le_bytes());
        payload.push(self.id);
        payload.push(PERSISTENCE_STORED);
        payload.push(0);
        payload.extend_from_slice(&self.value);
        ControlPacket::new(ControlType::SetState).with_payload(&payload)
    }

    pub fn serialize(self) -> Vec<u8> {
        self.into_control().serialize()
    }
}

/// Set the mesh time (seconds since the Unix epoch)
pub fn set_time_packet(timestamp: u32) -> ControlPacket {
    ControlPacket::new(ControlType::SetTime).with_u32(timestamp)
}

/// Activate iBeacon payload `index` every `interval_seconds`, starting `offset_seconds` into the interval
///
/// An interval of 0 activates the payload permanently.
pub fn ibeacon_config_id_packet(index: u8, offset_seconds: u32, interval_seconds: u16) -> ControlPacket {
    let mut payload = Vec::with_capacity(7);
    payload.push(index);
    payload.extend_from_slice(&offset_seconds.to_le_bytes());
    payload.extend_from_slice(&interval_seconds.to_le_bytes());
    ControlPacket::new(ControlType::SetIBeaconConfigId).with_payload(&payload)
}

/// Parse `"d8b094e7-569c-4bc6-8637-e11ce4221c18"` into the byte-reversed form the firmware stores
pub fn ibeacon_uuid_to_bytes(uuid: &str) -> Result<[u8; 16], CodecError> {
    let hex: Vec<u8> = uuid.bytes().filter(|&c| c != b'-').collect();
    if hex.len() != 32 {
        return Err(CodecError::InvalidUuid(uuid.to_string()));
    }

    let mut out = [0u8; 16];
    for (i, pair) in hex.chunks(2).enumerate() {
        let text = std::str::from_utf8(pair).map_err(|_| CodecError::InvalidUuid(uuid.to_string()))?;
        out[15 - i] =
            u8::from_str_radix(text, 16).map_err(|_| CodecError::InvalidUuid(uuid.to_string()))?;
    }
    Ok(out)
}
