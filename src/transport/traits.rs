//! Transport trait abstraction for the gateway link

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use meshuart_shared::{codec, UartMessage, UartTxType};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::UartError;

/// A byte stream to the gateway
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the transport gracefully
    async fn shutdown(&mut self) -> Result<()>;
}

/// Factory for opening the gateway link
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    /// The stream type this connector produces
    type Stream: TransportStream;

    /// Attempt to connect, returning a stream on success
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human-readable name for this transport
    fn name(&self) -> String;
}

/// Outbound side of the gateway link.
///
/// Writes are fire-and-forget: whatever the gateway thinks of a frame arrives
/// later on the event bus. The only error is a link that is gone for good.
#[async_trait]
pub trait TransportWriter: Send + Sync {
    /// Queue one fully encoded frame
    async fn write(&self, frame: Bytes) -> Result<(), UartError>;

    /// Wrap a serialized control packet in a UART frame and queue it
    async fn write_control(&self, control: &[u8]) -> Result<(), UartError> {
        let message = UartMessage::new(UartTxType::Control, control.to_vec());
        let frame = codec::encode(&message)?;
        self.write(frame).await
    }
}
