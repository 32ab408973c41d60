//! Mesh gateway wire protocol
//!
//! This crate provides the UART frame codec, the opcodes and result codes, and
//! the packet builders/parsers used to talk to a mesh gateway over a serial link.

pub mod codec;
pub mod packets;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

pub use codec::{CodecError, FrameDecoder, UartMessage};
pub use packets::*;
pub use types::*;

/// Get current timestamp in whole seconds since Unix epoch, rounded up
pub fn now_secs() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() + u64::from(now.subsec_nanos() > 0);
    secs as u32
}

/// Timing parameters of the gateway protocol
pub mod timing {
    /// How long the gateway may take to accept or reject a command
    pub const RESULT_TIMEOUT_MS: u64 = 2000;

    /// Wait for the second result after the gateway answered `WaitForSuccess`
    pub const SUCCESS_TIMEOUT_MS: u64 = 5000;

    /// Budget for each per-node acknowledgment and for the final acknowledgment
    pub const MESH_ACK_TIMEOUT_MS: u64 = 15000;

    /// Delay before resending a command the gateway reported busy
    pub const BUSY_BACKOFF_MS: u64 = 200;

    /// Pause after an unacknowledged broadcast was accepted
    pub const BROADCAST_SETTLE_MS: u64 = 100;

    /// Default size of a microapp upload chunk
    pub const MICROAPP_CHUNK_SIZE: usize = 128;
}
