//! Errors surfaced by gateway operations

use meshuart_shared::{CodecError, ResultValue};
use thiserror::Error;

pub type Result<T, E = UartError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum UartError {
    /// The gateway rejected the command
    #[error("{reason} (result: {code:?})")]
    CommandFailed { code: ResultValue, reason: String },

    #[error("Gateway still busy after {attempts} attempts")]
    BusyRetriesExhausted { attempts: u32 },

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Invalid stone id {0}: must be 1..=255")]
    InvalidStoneId(u8),

    #[error("No target stones given")]
    NoTargets,

    #[error("{0} target stones given, one mesh command names at most 255")]
    TooManyTargets(usize),

    #[error("Outbound queue full, gateway link is not keeping up")]
    QueueFull,

    #[error("Chunk size {0} must be between 1 and one frame's worth of data")]
    InvalidChunkSize(usize),

    #[error("Microapp of {size} bytes does not fit the upload offset range")]
    MicroappTooLarge { size: usize },

    #[error("UART link closed")]
    LinkClosed,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl UartError {
    pub fn command_failed(code: ResultValue) -> Self {
        Self::CommandFailed {
            code,
            reason: "Command has failed.".into(),
        }
    }
}
