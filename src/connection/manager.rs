//! UART connection with automatic reconnection

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use meshuart_shared::{FrameDecoder, MeshAck, ResultPacket, UartMessage, UartRxType};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, EventBus, HelloPacket, LogPacket, MeshFinalAck};
use crate::error::UartError;
use crate::transport::{TransportConnector, TransportStream, TransportWriter, DEFAULT_BAUD_RATE};

/// Events emitted by the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Link to the gateway is open
    Connected { transport: String },
    /// Open link was lost
    Disconnected { reason: String },
    /// Opening the link failed; another attempt follows after a backoff
    ConnectionFailed { reason: String },
}

/// Configuration for the UART connection
#[derive(Debug, Clone)]
pub struct UartConfig {
    /// Serial device, e.g. `/dev/ttyACM0`
    pub port: String,
    pub baud_rate: u32,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Frames queued for writing before writers wait
    pub outbound_capacity: usize,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud_rate: DEFAULT_BAUD_RATE,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            outbound_capacity: 100,
        }
    }
}

/// Persistent link to the gateway
///
/// Frames written while the link is down wait in the outbound queue and go
/// out once it is back. Writers never wait: a full queue is an error.
/// Connection events are buffered for [`recv_event`](UartConnection::recv_event)
/// and dropped once the buffer is full; the current link state is always
/// available through [`wait_connected`](UartConnection::wait_connected).
pub struct UartConnection {
    outbound_tx: mpsc::Sender<Bytes>,
    event_rx: Mutex<mpsc::Receiver<ConnectionEvent>>,
    /// Transport name while the link is open
    link_rx: watch::Receiver<Option<String>>,
}

impl UartConnection {
    /// Start the connection loop; inbound messages are published on `bus`
    pub fn new<C: TransportConnector>(connector: C, config: UartConfig, bus: EventBus) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Bytes>(config.outbound_capacity);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(EVENT_CAPACITY);
        let (link_tx, link_rx) = watch::channel(None);

        tokio::spawn(async move {
            let events = EventSink { event_tx, link_tx };
            connection_loop(connector, config, bus, outbound_rx, events).await;
        });

        Self {
            outbound_tx,
            event_rx: Mutex::new(event_rx),
            link_rx,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link_rx.borrow().is_some()
    }

    /// Receive the next connection event
    pub async fn recv_event(&self) -> Option<ConnectionEvent> {
        self.event_rx.lock().await.recv().await
    }

    /// Wait until the link is open, returning the transport name.
    ///
    /// Returns at once if it already is. Does not consume connection events.
    pub async fn wait_connected(&self, limit: Duration) -> Result<String, UartError> {
        let mut link_rx = self.link_rx.clone();
        let wait = async move {
            let link = link_rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| UartError::LinkClosed)?;
            let transport = link.as_ref().cloned().unwrap_or_default();
            Ok(transport)
        };
        timeout(limit, wait)
            .await
            .map_err(|_| UartError::Timeout("connection"))?
    }
}

#[async_trait]
impl TransportWriter for UartConnection {
    async fn write(&self, frame: Bytes) -> Result<(), UartError> {
        self.outbound_tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!("Outbound queue full, dropping frame");
                UartError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => UartError::LinkClosed,
        })
    }
}

const EVENT_CAPACITY: usize = 100;

/// Reports link changes without ever blocking the connection loop
struct EventSink {
    event_tx: mpsc::Sender<ConnectionEvent>,
    link_tx: watch::Sender<Option<String>>,
}

impl EventSink {
    fn send(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Connected { transport } => {
                self.link_tx.send_replace(Some(transport.clone()));
            }
            ConnectionEvent::Disconnected { .. } => {
                self.link_tx.send_replace(None);
            }
            ConnectionEvent::ConnectionFailed { .. } => {}
        }
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            debug!("Connection event not read in time, dropped: {:?}", event);
        }
    }

    /// Nobody holds the connection anymore
    fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop<C: TransportConnector>(
    connector: C,
    config: UartConfig,
    bus: EventBus,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    events: EventSink,
) {
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        match timeout(config.connect_timeout, connector.connect()).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;
                info!("Connected to gateway via {}", connector.name());
                events.send(ConnectionEvent::Connected {
                    transport: connector.name(),
                });

                match handle_connection(stream, &bus, &mut outbound_rx).await {
                    Ok(()) => {
                        debug!("Connection handle dropped, closing {}", connector.name());
                        return;
                    }
                    Err(reason) => {
                        warn!("Gateway link lost: {}", reason);
                        events.send(ConnectionEvent::Disconnected {
                            reason: reason.to_string(),
                        });
                    }
                }
            }
            Ok(Err(e)) => {
                warn!("Failed to open {}: {:#}", connector.name(), e);
                events.send(ConnectionEvent::ConnectionFailed {
                    reason: format!("{:#}", e),
                });
            }
            Err(_) => {
                events.send(ConnectionEvent::ConnectionFailed {
                    reason: format!("Timed out opening {}", connector.name()),
                });
            }
        }

        if events.is_closed() {
            return;
        }

        // Wait before reconnecting
        tokio::time::sleep(reconnect_delay).await;

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }
}

/// Handle an open link until it fails (`Err`) or every writer is gone (`Ok`)
async fn handle_connection<S: TransportStream>(
    stream: S,
    bus: &EventBus,
    outbound_rx: &mut mpsc::Receiver<Bytes>,
) -> Result<()> {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        writer.write_all(&frame).await?;
                        writer.flush().await?;
                    }
                    None => break,
                }
            }

            read = reader.read(&mut read_buf) => {
                let n = read.map_err(|e| anyhow!("Read error: {}", e))?;
                if n == 0 {
                    return Err(anyhow!("Gateway closed the link"));
                }
                decoder.extend(&read_buf[..n]);

                loop {
                    match decoder.decode_next() {
                        Ok(Some(message)) => publish_uart_message(bus, message),
                        Ok(None) => break,
                        Err(e) => warn!("Dropping bad frame: {}", e),
                    }
                }
            }
        }
    }

    let mut stream = reader.unsplit(writer);
    TransportStream::shutdown(&mut stream).await
}

/// Publish a decoded message: always raw on the message topic, then parsed on its own topic.
///
/// A payload that fails to parse is logged and dropped.
pub fn publish_uart_message(bus: &EventBus, message: UartMessage) {
    let opcode = UartRxType::from(message.opcode);
    let payload = message.payload.clone();
    bus.publish(message);

    let event: Result<BusEvent, _> = match opcode {
        UartRxType::ResultPacket => ResultPacket::parse(&payload).map(BusEvent::from),
        UartRxType::MeshResult => MeshAck::parse(&payload).map(BusEvent::from),
        UartRxType::MeshAckAllResult => {
            ResultPacket::parse(&payload).map(|result| MeshFinalAck(result).into())
        }
        UartRxType::Hello => Ok(HelloPacket { payload }.into()),
        UartRxType::Log | UartRxType::LogArray => Ok(LogPacket { payload }.into()),
        other => {
            debug!("No topic for {:?}", other);
            return;
        }
    };

    match event {
        Ok(event) => {
            bus.publish(event);
        }
        Err(e) => warn!("Dropping malformed {:?} payload: {}", opcode, e),
    }
}
