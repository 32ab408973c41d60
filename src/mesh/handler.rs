//! Mesh command dispatch and acknowledgment correlation
//!
//! Responses to mesh commands come back as bare events on shared topics. Each
//! command therefore subscribes its collectors before the frame goes out and
//! reads the responses in a fixed order: acceptance, then per-node acks, then
//! the final ack.

use std::sync::Arc;
use std::time::Duration;

use meshuart_shared::{
    ibeacon_config_id_packet, ibeacon_uuid_to_bytes, now_secs, set_time_packet, timing,
    ControlPacket, ControlType, MeshAck, MeshCommandKind, MeshCommandPacket, MAX_MESH_TARGETS,
    MeshMultiSwitchPacket, ResultPacket, ResultValue, StateSetPacket, StateType, StoneSwitch,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::result::MeshResult;
use crate::bus::{EventBus, MeshFinalAck};
use crate::collector::{BatchCollector, Collector};
use crate::error::{Result, UartError};
use crate::retry::BusyRetry;
use crate::transport::TransportWriter;

/// Switch value for fully on
pub const SWITCH_ON: u8 = 255;
/// Switch value for off
pub const SWITCH_OFF: u8 = 0;

/// Timing of the mesh protocol
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Wait for the gateway to accept a command
    pub result_timeout: Duration,
    /// Wait for each per-node acknowledgment
    pub node_ack_timeout: Duration,
    /// Wait for the final acknowledgment
    pub final_ack_timeout: Duration,
    /// Pause after an accepted unacknowledged broadcast
    pub broadcast_settle: Duration,
    pub busy_retry: BusyRetry,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            result_timeout: Duration::from_millis(timing::RESULT_TIMEOUT_MS),
            node_ack_timeout: Duration::from_millis(timing::MESH_ACK_TIMEOUT_MS),
            final_ack_timeout: Duration::from_millis(timing::MESH_ACK_TIMEOUT_MS),
            broadcast_settle: Duration::from_millis(timing::BROADCAST_SETTLE_MS),
            busy_retry: BusyRetry::default(),
        }
    }
}

/// Collectors for the acknowledgment phases, subscribed before dispatch
struct AckCollectors {
    individual: BatchCollector<MeshAck>,
    last: Collector<MeshFinalAck>,
}

/// Map a `0.0 ..= 1.0` switch state onto the `0 ..= 255` switch value, clamping anything outside.
pub fn switch_value(state: f64) -> u8 {
    let state = if state.is_nan() { 0.0 } else { state.clamp(0.0, 1.0) };
    (state * f64::from(SWITCH_ON)).round() as u8
}

fn check_stone_id(id: u8) -> Result<u8> {
    if id == 0 {
        return Err(UartError::InvalidStoneId(id));
    }
    Ok(id)
}

fn check_targets(ids: &[u8]) -> Result<()> {
    if ids.is_empty() {
        return Err(UartError::NoTargets);
    }
    if ids.len() > MAX_MESH_TARGETS {
        return Err(UartError::TooManyTargets(ids.len()));
    }
    for &id in ids {
        check_stone_id(id)?;
    }
    Ok(())
}

/// Issues commands to mesh nodes through the gateway
pub struct MeshHandler {
    bus: EventBus,
    writer: Arc<dyn TransportWriter>,
    config: MeshConfig,
    /// Held while an acknowledged command collects acks; responses carry no request id
    acked_lock: Mutex<()>,
}

impl MeshHandler {
    pub fn new(bus: EventBus, writer: Arc<dyn TransportWriter>, config: MeshConfig) -> Self {
        Self {
            bus,
            writer,
            config,
            acked_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub async fn turn_on(&self, stone_id: u8) -> Result<()> {
        self.switch_stone(stone_id, SWITCH_ON).await
    }

    pub async fn turn_off(&self, stone_id: u8) -> Result<()> {
        self.switch_stone(stone_id, SWITCH_OFF).await
    }

    /// Set a stone to `state` in `0.0 ..= 1.0`; out-of-range values are clamped.
    pub async fn set_switch_state(&self, stone_id: u8, state: f64) -> Result<()> {
        self.switch_stone(stone_id, switch_value(state)).await
    }

    /// Send a switch command without waiting for any response.
    ///
    /// The radio link gives no confirmation for switching; poll the stone's
    /// state if you need to know it happened.
    async fn switch_stone(&self, stone_id: u8, value: u8) -> Result<()> {
        let stone_id = check_stone_id(stone_id)?;
        let multi_switch = MeshMultiSwitchPacket::new(vec![StoneSwitch { stone_id, value }]);
        let control = ControlPacket::new(ControlType::MultiSwitch)
            .with_payload(&multi_switch.serialize())
            .serialize();

        debug!("Switching stone {} to {}", stone_id, value);
        self.writer.write_control(&control).await
    }

    /// Broadcast the time to the whole mesh; defaults to now.
    pub async fn set_time(&self, timestamp: Option<u32>) -> Result<()> {
        let timestamp = timestamp.unwrap_or_else(now_secs);
        info!("Setting mesh time to {}", timestamp);
        self.command_via_mesh_broadcast(&set_time_packet(timestamp)).await
    }

    pub async fn send_no_op(&self) -> Result<()> {
        self.command_via_mesh_broadcast(&ControlPacket::new(ControlType::NoOperation))
            .await
    }

    /// Store an iBeacon UUID (`"d8b094e7-569c-4bc6-8637-e11ce4221c18"`) in slot `index`.
    ///
    /// Slot 0 is normally filled during setup; slot 1 is only needed for alternating payloads.
    pub async fn set_ibeacon_uuid(&self, stone_id: u8, uuid: &str, index: u8) -> Result<MeshResult> {
        let uuid = ibeacon_uuid_to_bytes(uuid)?;
        let state = StateSetPacket::new(StateType::IBeaconUuid, index).with_bytes(&uuid);
        self.set_state_via_mesh_acked(stone_id, &state.into_control()).await
    }

    pub async fn set_ibeacon_major(&self, stone_id: u8, major: u16, index: u8) -> Result<MeshResult> {
        let state = StateSetPacket::new(StateType::IBeaconMajor, index).with_u16(major);
        self.set_state_via_mesh_acked(stone_id, &state.into_control()).await
    }

    pub async fn set_ibeacon_minor(&self, stone_id: u8, minor: u16, index: u8) -> Result<MeshResult> {
        let state = StateSetPacket::new(StateType::IBeaconMinor, index).with_u16(minor);
        self.set_state_via_mesh_acked(stone_id, &state.into_control()).await
    }

    /// Make iBeacon payload `index` active every `interval_seconds`, starting `offset_seconds` in.
    ///
    /// Alternating two payloads takes two calls. To swap every minute:
    /// index 0 with interval 120 and offset 0, then index 1 with interval 120 and offset 60.
    /// ```text
    /// T      = 0 ..... 60 ..... 120 ..... 180 ..... 240
    /// active = 0 ..... 1 ...... 0 ....... 1 ....... 0
    /// ```
    pub async fn periodically_activate_ibeacon_index(
        &self,
        stone_ids: &[u8],
        index: u8,
        interval_seconds: u16,
        offset_seconds: u32,
    ) -> Result<MeshResult> {
        let packet = ibeacon_config_id_packet(index, offset_seconds, interval_seconds);
        self.command_via_mesh_broadcast_acked(stone_ids, &packet).await
    }

    /// Stop alternating payload `index`, leaving the other payload permanently active.
    ///
    /// First the other slot is made permanently active on every stone, then
    /// slot `index` is ended, but only on stones that took the first step.
    /// Stones that failed the first step keep `false` in the result.
    pub async fn stop_ibeacon_interval_and_set_index(
        &self,
        stone_ids: &[u8],
        index: u8,
    ) -> Result<MeshResult> {
        let index_to_start_with = if index == 0 { 1 } else { 0 };
        let start = ibeacon_config_id_packet(index_to_start_with, 0, 0);
        let finish = ibeacon_config_id_packet(index, 0, 0);

        let mut mesh_result = MeshResult::new(stone_ids);

        let initial = self.command_via_mesh_broadcast_acked(stone_ids, &start).await?;
        mesh_result.merge(initial);

        let successful = mesh_result.successful_ids();
        if successful.is_empty() {
            warn!("No stone switched to iBeacon slot {}, not ending slot {}", index_to_start_with, index);
            return Ok(mesh_result);
        }

        let second = self.command_via_mesh_broadcast_acked(&successful, &finish).await?;
        mesh_result.merge(second);

        Ok(mesh_result)
    }

    /// Broadcast a control packet to every node; nobody acknowledges.
    pub async fn command_via_mesh_broadcast(&self, packet: &ControlPacket) -> Result<()> {
        self.dispatch(&MeshCommandKind::Broadcast, packet, || ()).await?;
        tokio::time::sleep(self.config.broadcast_settle).await;
        Ok(())
    }

    /// Broadcast a control packet and collect acknowledgments from `stone_ids`.
    pub async fn command_via_mesh_broadcast_acked(
        &self,
        stone_ids: &[u8],
        packet: &ControlPacket,
    ) -> Result<MeshResult> {
        check_targets(stone_ids)?;
        let kind = MeshCommandKind::BroadcastAcked {
            ids: stone_ids.to_vec(),
        };

        let _guard = self.acked_lock.lock().await;
        let collectors = self.dispatch(&kind, packet, || self.ack_collectors()).await?;
        Ok(self.handle_collectors(stone_ids, collectors).await)
    }

    /// Send a set-state control packet to one stone and collect its acknowledgment.
    pub async fn set_state_via_mesh_acked(
        &self,
        stone_id: u8,
        packet: &ControlPacket,
    ) -> Result<MeshResult> {
        let stone_id = check_stone_id(stone_id)?;
        let kind = MeshCommandKind::SetState { id: stone_id };

        let _guard = self.acked_lock.lock().await;
        let collectors = self.dispatch(&kind, packet, || self.ack_collectors()).await?;
        Ok(self.handle_collectors(&[stone_id], collectors).await)
    }

    /// Send until the gateway stops reporting busy.
    ///
    /// A missing acceptance counts as accepted. Any other failure ends the call.
    /// `subscribe` runs before every attempt so its collectors never miss a fast response.
    async fn dispatch<C>(
        &self,
        kind: &MeshCommandKind,
        packet: &ControlPacket,
        subscribe: impl Fn() -> C,
    ) -> Result<C> {
        let mesh_packet = MeshCommandPacket::new(kind.clone(), packet.serialize());
        let control = ControlPacket::new(ControlType::MeshCommand)
            .with_payload(&mesh_packet.serialize())
            .serialize();

        let mut attempts = 0;
        loop {
            attempts += 1;

            let acceptance = Collector::filtered(
                &self.bus,
                self.config.result_timeout,
                |result: &ResultPacket| result.is_for(ControlType::MeshCommand),
            );
            let collectors = subscribe();

            debug!(
                "Sending {:?} mesh command (flags {}, attempt {})",
                packet.control_type(),
                kind.flags(),
                attempts
            );
            self.writer.write_control(&control).await?;

            match acceptance.receive().await.map(|result| result.result) {
                Some(ResultValue::Busy) => {
                    self.config.busy_retry.backoff(attempts).await?;
                    continue;
                }
                Some(ResultValue::Success) => {}
                Some(code) => {
                    warn!("Mesh command {:?} rejected: {:?}", packet.control_type(), code);
                    return Err(UartError::command_failed(code));
                }
                None => debug!("No acceptance for mesh command, assuming it went out"),
            }

            return Ok(collectors);
        }
    }

    fn ack_collectors(&self) -> AckCollectors {
        AckCollectors {
            individual: BatchCollector::new(&self.bus, self.config.node_ack_timeout),
            last: Collector::new(&self.bus, self.config.final_ack_timeout),
        }
    }

    /// Correlate the acknowledgment phases into a [`MeshResult`].
    ///
    /// Exactly one wait per requested stone, however many actually answer.
    async fn handle_collectors(&self, stone_ids: &[u8], collectors: AckCollectors) -> MeshResult {
        let AckCollectors {
            mut individual,
            last,
        } = collectors;
        let mut result = MeshResult::new(stone_ids);

        for _ in stone_ids {
            if let Some(ack) = individual.receive().await {
                if result.set_ack(ack.stone_id, ack.is_success()) {
                    debug!("Stone {} acked: {:?}", ack.stone_id, ack.result.result);
                } else {
                    debug!("Ignoring ack from untargeted stone {}", ack.stone_id);
                }
            }
            individual.clear();
        }
        individual.cleanup();

        let final_ack = last.receive().await.map(|ack| ack.is_success());
        result.set_final(final_ack);

        if !result.success() {
            warn!(
                "Mesh command not confirmed (final ack {:?}, acked {:?} of {:?})",
                final_ack,
                result.successful_ids(),
                result.requested_ids()
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LogPacket;
    use crate::testing::{final_ack, mesh_accepted, node_ack, ScriptedGateway};
    use bytes::Bytes;
    use tokio::time::Instant;

    fn handler(gateway: &Arc<ScriptedGateway>, bus: &EventBus) -> MeshHandler {
        MeshHandler::new(bus.clone(), gateway.clone(), MeshConfig::default())
    }

    fn setup(replies: Vec<crate::testing::Reply>) -> (EventBus, Arc<ScriptedGateway>, MeshHandler) {
        let bus = EventBus::new();
        let gateway = Arc::new(ScriptedGateway::new(&bus, replies));
        let mesh = handler(&gateway, &bus);
        (bus, gateway, mesh)
    }

    #[test]
    fn test_switch_value_clamps() {
        assert_eq!(switch_value(-5.0), SWITCH_OFF);
        assert_eq!(switch_value(0.0), SWITCH_OFF);
        assert_eq!(switch_value(0.5), 128);
        assert_eq!(switch_value(1.0), SWITCH_ON);
        assert_eq!(switch_value(1000.0), SWITCH_ON);
        assert_eq!(switch_value(f64::NAN), SWITCH_OFF);
    }

    #[tokio::test]
    async fn test_turn_on_sends_multi_switch() {
        let (_bus, gateway, mesh) = setup(vec![]);

        mesh.turn_on(12).await.expect("switch failed");
        mesh.set_switch_state(12, 1000.0).await.expect("switch failed");

        let expected = MeshMultiSwitchPacket::new(vec![StoneSwitch {
            stone_id: 12,
            value: SWITCH_ON,
        }])
        .serialize();
        let controls = gateway.controls();
        assert_eq!(controls.len(), 2);
        for control in controls {
            assert_eq!(control.control_type(), ControlType::MultiSwitch);
            assert_eq!(control.payload(), &expected[..]);
        }
    }

    #[tokio::test]
    async fn test_invalid_targets_send_nothing() {
        let (_bus, gateway, mesh) = setup(vec![]);

        assert!(matches!(mesh.turn_off(0).await, Err(UartError::InvalidStoneId(0))));
        assert!(matches!(
            mesh.periodically_activate_ibeacon_index(&[], 0, 120, 0).await,
            Err(UartError::NoTargets)
        ));
        assert!(matches!(
            mesh.set_ibeacon_major(0, 1, 0).await,
            Err(UartError::InvalidStoneId(0))
        ));
        assert!(gateway.frames().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_target_list_is_rejected() {
        let (_bus, gateway, mesh) = setup(vec![]);
        let ids: Vec<u8> = (1..=255).chain([1]).collect();

        assert!(matches!(
            mesh.periodically_activate_ibeacon_index(&ids, 0, 120, 0).await,
            Err(UartError::TooManyTargets(256))
        ));
        assert!(gateway.frames().is_empty());
    }

    #[tokio::test]
    async fn test_bad_uuid_is_rejected_before_sending() {
        let (_bus, gateway, mesh) = setup(vec![]);

        let result = mesh.set_ibeacon_uuid(3, "not-a-uuid", 0).await;
        assert!(matches!(result, Err(UartError::Codec(_))));
        assert!(gateway.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_waits_for_settle() {
        let (_bus, gateway, mesh) = setup(vec![vec![mesh_accepted(ResultValue::Success)]]);

        let started = Instant::now();
        mesh.set_time(Some(42)).await.expect("set time failed");
        assert!(started.elapsed() >= mesh.config().broadcast_settle);

        let commands = gateway.mesh_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].kind, MeshCommandKind::Broadcast);
        assert_eq!(commands[0].payload, set_time_packet(42).serialize());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_acceptance_counts_as_sent() {
        let (_bus, gateway, mesh) = setup(vec![]);

        let started = Instant::now();
        mesh.send_no_op().await.expect("no-op failed");
        assert!(started.elapsed() >= mesh.config().result_timeout);
        assert_eq!(gateway.frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_gateway_is_retried() {
        let (_bus, gateway, mesh) = setup(vec![
            vec![mesh_accepted(ResultValue::Busy)],
            vec![mesh_accepted(ResultValue::Busy)],
            vec![
                mesh_accepted(ResultValue::Success),
                node_ack(4, ResultValue::Success),
                final_ack(ResultValue::Success),
            ],
        ]);

        let started = Instant::now();
        let result = mesh
            .periodically_activate_ibeacon_index(&[4], 1, 120, 60)
            .await
            .expect("command failed");

        assert_eq!(gateway.frames().len(), 3);
        assert!(started.elapsed() >= 2 * mesh.config().busy_retry.backoff);
        assert_eq!(result.ack(4), Some(true));
        assert!(result.success());

        let commands = gateway.mesh_commands();
        assert!(commands.iter().all(|c| c == &commands[0]));
        assert_eq!(
            commands[0].payload,
            ibeacon_config_id_packet(1, 60, 120).serialize()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_retry_limit() {
        let bus = EventBus::new();
        let gateway = Arc::new(ScriptedGateway::new(
            &bus,
            vec![
                vec![mesh_accepted(ResultValue::Busy)],
                vec![mesh_accepted(ResultValue::Busy)],
            ],
        ));
        let config = MeshConfig {
            busy_retry: BusyRetry {
                max_retries: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let mesh = MeshHandler::new(bus, gateway.clone(), config);

        let result = mesh.send_no_op().await;
        assert!(matches!(
            result,
            Err(UartError::BusyRetriesExhausted { attempts: 2 })
        ));
        assert_eq!(gateway.frames().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_command_fails() {
        let (_bus, _gateway, mesh) = setup(vec![vec![mesh_accepted(ResultValue::WrongState)]]);

        match mesh.set_ibeacon_minor(7, 100, 0).await {
            Err(UartError::CommandFailed { code, .. }) => assert_eq!(code, ResultValue::WrongState),
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_for_other_commands_are_not_acceptance() {
        let (_bus, gateway, mesh) = setup(vec![vec![
            crate::testing::accepted(ControlType::MultiSwitch, ResultValue::WrongState),
            mesh_accepted(ResultValue::Success),
            node_ack(9, ResultValue::Success),
            final_ack(ResultValue::Success),
        ]]);

        let result = mesh.set_ibeacon_major(9, 500, 1).await.expect("command failed");
        assert_eq!(result.ack(9), Some(true));
        assert!(result.success());
        assert_eq!(
            gateway.mesh_commands()[0].kind,
            MeshCommandKind::SetState { id: 9 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_mesh_times_out_per_stone() {
        let (_bus, _gateway, mesh) = setup(vec![]);

        let started = Instant::now();
        let result = mesh
            .periodically_activate_ibeacon_index(&[1, 2, 3], 0, 0, 0)
            .await
            .expect("command failed");

        // acceptance, one wait per stone, then the final ack
        assert!(started.elapsed() >= Duration::from_secs(2 + 3 * 15 + 15));
        assert_eq!(result.acks().collect::<Vec<_>>(), vec![(1, false), (2, false), (3, false)]);
        assert_eq!(result.final_ack(), None);
        assert!(!result.success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_burst_keeps_final_ack() {
        let mut reply = vec![
            mesh_accepted(ResultValue::Success),
            node_ack(1, ResultValue::Success),
            final_ack(ResultValue::Success),
        ];
        for _ in 0..300 {
            let log = LogPacket {
                payload: Bytes::from_static(b"gateway log"),
            };
            reply.push((Duration::ZERO, log.into()));
        }
        let (bus, _gateway, mesh) = setup(vec![reply]);
        let _log_listener = bus.subscribe::<LogPacket>();

        let result = mesh
            .periodically_activate_ibeacon_index(&[1, 2], 0, 0, 0)
            .await
            .expect("command failed");

        assert_eq!(result.ack(1), Some(true));
        assert_eq!(result.ack(2), Some(false));
        assert_eq!(result.final_ack(), Some(true));
        assert!(result.success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_untargeted_ack_uses_up_a_wait() {
        let (_bus, _gateway, mesh) = setup(vec![vec![
            mesh_accepted(ResultValue::Success),
            node_ack(9, ResultValue::Success),
            node_ack(1, ResultValue::Success),
            final_ack(ResultValue::Success),
        ]]);

        let result = mesh
            .periodically_activate_ibeacon_index(&[1, 2], 0, 0, 0)
            .await
            .expect("command failed");

        assert_eq!(result.ack(1), Some(true));
        assert_eq!(result.ack(2), Some(false));
        assert_eq!(result.ack(9), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interval_skips_failed_stones() {
        let (_bus, gateway, mesh) = setup(vec![
            vec![
                mesh_accepted(ResultValue::Success),
                node_ack(1, ResultValue::Success),
                node_ack(2, ResultValue::Success),
                node_ack(3, ResultValue::NotFound),
                final_ack(ResultValue::Success),
            ],
            vec![
                mesh_accepted(ResultValue::Success),
                node_ack(1, ResultValue::Success),
                node_ack(2, ResultValue::Success),
                final_ack(ResultValue::Success),
            ],
        ]);

        let result = mesh
            .stop_ibeacon_interval_and_set_index(&[1, 2, 3], 1)
            .await
            .expect("command failed");

        let commands = gateway.mesh_commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].kind, MeshCommandKind::BroadcastAcked { ids: vec![1, 2, 3] });
        assert_eq!(commands[0].payload, ibeacon_config_id_packet(0, 0, 0).serialize());
        assert_eq!(commands[1].kind, MeshCommandKind::BroadcastAcked { ids: vec![1, 2] });
        assert_eq!(commands[1].payload, ibeacon_config_id_packet(1, 0, 0).serialize());

        assert_eq!(result.acks().collect::<Vec<_>>(), vec![(1, true), (2, true), (3, false)]);
        assert!(result.success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interval_stops_when_nobody_switched() {
        let (_bus, gateway, mesh) = setup(vec![vec![
            mesh_accepted(ResultValue::Success),
            node_ack(1, ResultValue::NotFound),
            final_ack(ResultValue::Unspecified),
        ]]);

        let result = mesh
            .stop_ibeacon_interval_and_set_index(&[1], 0)
            .await
            .expect("command failed");

        assert_eq!(gateway.frames().len(), 1);
        assert_eq!(
            gateway.mesh_commands()[0].payload,
            ibeacon_config_id_packet(1, 0, 0).serialize()
        );
        assert_eq!(result.ack(1), Some(false));
        assert!(!result.success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acked_commands_do_not_interleave() {
        let reply = || {
            vec![
                mesh_accepted(ResultValue::Success),
                node_ack(5, ResultValue::Success),
                final_ack(ResultValue::Success),
            ]
        };
        let (_bus, gateway, mesh) = setup(vec![reply(), reply()]);
        let mesh = Arc::new(mesh);

        let first = {
            let mesh = mesh.clone();
            tokio::spawn(async move { mesh.set_ibeacon_major(5, 1, 0).await })
        };
        let second = {
            let mesh = mesh.clone();
            tokio::spawn(async move { mesh.set_ibeacon_minor(5, 2, 0).await })
        };

        for handle in [first, second] {
            let result = handle.await.expect("task panicked").expect("command failed");
            assert_eq!(result.ack(5), Some(true));
            assert!(result.success());
        }
        assert_eq!(gateway.frames().len(), 2);
    }
}
