//! Mesh command packets
//!
//! A mesh command wraps a control packet and tells the gateway how to spread it:
//! ```text
//! [ type: u8 ][ flags: u8 ][ timeout: u8 ][ id count: u8 ][ ids ][ control packet ]
//! ```

use super::Reader;
use crate::codec::CodecError;

/// Mesh payload type: a control command
const MESH_TYPE_CONTROL: u8 = 0;

const FLAG_BROADCAST: u8 = 0x01;
const FLAG_ACK_ALL_IDS: u8 = 0x02;

/// Most stones one mesh command can name; the id count is a single byte
pub const MAX_MESH_TARGETS: usize = u8::MAX as usize;

/// The fixed set of ways a command can be spread through the mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshCommandKind {
    /// Every node, nobody acknowledges
    Broadcast,
    /// Every node, the listed nodes acknowledge
    BroadcastAcked { ids: Vec<u8> },
    /// One node, which acknowledges
    SetState { id: u8 },
}

impl MeshCommandKind {
    pub fn flags(&self) -> u8 {
        match self {
            Self::Broadcast => FLAG_BROADCAST,
            Self::BroadcastAcked { .. } => FLAG_BROADCAST | FLAG_ACK_ALL_IDS,
            Self::SetState { .. } => FLAG_ACK_ALL_IDS,
        }
    }

    /// Nodes named in the packet
    pub fn ids(&self) -> &[u8] {
        match self {
            Self::Broadcast => &[],
            Self::BroadcastAcked { ids } => ids,
            Self::SetState { id } => std::slice::from_ref(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshCommandPacket {
    pub kind: MeshCommandKind,
    /// 0 lets the firmware pick its default
    pub timeout_seconds: u8,
    pub payload: Vec<u8>,
}

impl MeshCommandPacket {
    pub fn new(kind: MeshCommandKind, payload: Vec<u8>) -> Self {
        Self {
            kind,
            timeout_seconds: 0,
            payload,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let ids = self.kind.ids();
        let mut out = Vec::with_capacity(4 + ids.len() + self.payload.len());
        out.push(MESH_TYPE_CONTROL);
        out.push(self.kind.flags());
        out.push(self.timeout_seconds);
        out.push(ids.len() as u8);
        out.extend_from_slice(ids);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(data);
        let _mesh_type = reader.u8()?;
        let flags = reader.u8()?;
        let timeout_seconds = reader.u8()?;
        let count = reader.u8()? as usize;
        let ids = reader.bytes(count)?.to_vec();

        let kind = match flags {
            FLAG_BROADCAST => MeshCommandKind::Broadcast,
            f if f == FLAG_BROADCAST | FLAG_ACK_ALL_IDS => MeshCommandKind::BroadcastAcked { ids },
            FLAG_ACK_ALL_IDS if ids.len() == 1 => MeshCommandKind::SetState { id: ids[0] },
            other => {
                return Err(CodecError::UnknownValue {
                    kind: "mesh flags",
                    value: other as u16,
                })
            }
        };

        Ok(Self {
            kind,
            timeout_seconds,
            payload: reader.remaining().to_vec(),
        })
    }
}

/// One entry of a multi-switch packet; `value` is 0 (off) ..= 255 (fully on)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoneSwitch {
    pub stone_id: u8,
    pub value: u8,
}

/// `[ type: u8 ][ count: u8 ][ (stone id: u8, value: u8) * count ]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshMultiSwitchPacket {
    switches: Vec<StoneSwitch>,
}

impl MeshMultiSwitchPacket {
    pub fn new(switches: Vec<StoneSwitch>) -> Self {
        Self { switches }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 2 * self.switches.len());
        out.push(MESH_TYPE_CONTROL);
        out.push(self.switches.len() as u8);
        for switch in &self.switches {
            out.push(switch.stone_id);
            out.push(switch.value);
        }
        out
    }
}
