use std::sync::Arc;
use std::time::Duration;

use meshuart_shared::{timing, ControlPacket, ControlType, ResultPacket, ResultValue};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::collector::BatchCollector;
use crate::error::{Result, UartError};
use crate::retry::BusyRetry;
use crate::transport::TransportWriter;

#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Wait for the first result of a command
    pub result_timeout: Duration,
    /// Wait for the final result after `WaitForSuccess`
    pub success_timeout: Duration,
    pub busy_retry: BusyRetry,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            result_timeout: Duration::from_millis(timing::RESULT_TIMEOUT_MS),
            success_timeout: Duration::from_millis(timing::SUCCESS_TIMEOUT_MS),
            busy_retry: BusyRetry::default(),
        }
    }
}

/// Sends control packets to the gateway and waits for the matching result packet
pub struct ControlHandler {
    bus: EventBus,
    writer: Arc<dyn TransportWriter>,
    config: ControlConfig,
    /// Results only carry the command type, so one exchange at a time
    lock: Mutex<()>,
}

impl ControlHandler {
    pub fn new(bus: EventBus, writer: Arc<dyn TransportWriter>, config: ControlConfig) -> Self {
        Self {
            bus,
            writer,
            config,
            lock: Mutex::new(()),
        }
    }

    /// Send `packet` and return the first result for its command type, whatever its code.
    ///
    /// A busy gateway is retried; no result at all is a [`UartError::Timeout`].
    pub async fn write_control_and_get_result(&self, packet: &ControlPacket) -> Result<ResultPacket> {
        self.exchange(packet, false).await
    }

    /// Send `packet` and require `Success`, waiting out a `WaitForSuccess` if the gateway sends one.
    pub async fn write_control_and_wait_for_success(
        &self,
        packet: &ControlPacket,
    ) -> Result<ResultPacket> {
        self.exchange(packet, true).await
    }

    async fn exchange(&self, packet: &ControlPacket, wait_for_success: bool) -> Result<ResultPacket> {
        let control_type = packet.control_type();
        let control = packet.serialize();
        let _guard = self.lock.lock().await;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut results = BatchCollector::filtered(
                &self.bus,
                self.config.result_timeout,
                move |result: &ResultPacket| result.is_for(control_type),
            );

            debug!("Sending {:?} (attempt {})", control_type, attempts);
            self.writer.write_control(&control).await?;

            let mut result = results
                .receive()
                .await
                .ok_or(UartError::Timeout("result packet"))?;

            if result.result == ResultValue::Busy {
                self.config.busy_retry.backoff(attempts).await?;
                continue;
            }
            if !wait_for_success {
                return Ok(result);
            }

            if result.result == ResultValue::WaitForSuccess {
                debug!("{:?} in progress, waiting for success", control_type);
                result = results
                    .receive_within(self.config.success_timeout)
                    .await
                    .ok_or(UartError::Timeout("success result"))?;
            }
            results.cleanup();

            if !result.result.is_success() {
                warn!("{:?} failed: {:?}", control_type, result.result);
                return Err(UartError::command_failed(result.result));
            }
            return Ok(result);
        }
    }
}
