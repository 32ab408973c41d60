//! Microapp slots on the gateway firmware

use std::sync::Arc;

use meshuart_shared::{
    ControlPacket, ControlType, MicroappHeader, MicroappInfo, MicroappUploadPacket, ResultValue,
};
use tracing::info;

use super::handler::ControlHandler;
use crate::error::{Result, UartError};

const CHUNK_ALIGNMENT: usize = 4;
const PADDING: u8 = 0xFF;

pub struct MicroappHandler {
    control: Arc<ControlHandler>,
}

impl MicroappHandler {
    pub fn new(control: Arc<ControlHandler>) -> Self {
        Self { control }
    }

    pub async fn get_microapp_info(&self) -> Result<MicroappInfo> {
        let result = self
            .control
            .write_control_and_get_result(&ControlPacket::new(ControlType::MicroappGetInfo))
            .await?;
        if !result.result.is_success() {
            return Err(UartError::command_failed(result.result));
        }
        let info = MicroappInfo::parse(&result.payload)?;
        info!("Microapp info: {:?}", info);
        Ok(info)
    }

    /// Upload a microapp binary into slot `index`, `chunk_size` bytes per packet.
    ///
    /// Chunks are padded with `0xFF` to a multiple of 4 bytes. Each must be
    /// confirmed before the next goes out.
    pub async fn upload_microapp(
        &self,
        data: &[u8],
        index: u8,
        protocol: u8,
        chunk_size: usize,
    ) -> Result<()> {
        if chunk_size == 0 || chunk_size > MicroappUploadPacket::MAX_DATA_LEN {
            return Err(UartError::InvalidChunkSize(chunk_size));
        }
        if let Some(last) = data.len().checked_sub(1) {
            if u16::try_from(last / chunk_size * chunk_size).is_err() {
                return Err(UartError::MicroappTooLarge { size: data.len() });
            }
        }

        let header = MicroappHeader::new(index, protocol);
        for (offset, chunk) in (0usize..).step_by(chunk_size).zip(data.chunks(chunk_size)) {
            let offset = u16::try_from(offset)
                .map_err(|_| UartError::MicroappTooLarge { size: data.len() })?;
            let mut chunk = chunk.to_vec();
            let padded = chunk.len().next_multiple_of(CHUNK_ALIGNMENT);
            chunk.resize(padded, PADDING);

            info!("Uploading microapp chunk index={} offset={} size={}", index, offset, chunk.len());
            let upload = MicroappUploadPacket {
                header,
                offset,
                data: chunk,
            };
            let packet = ControlPacket::new(ControlType::MicroappUpload).with_payload(&upload.serialize());
            self.control.write_control_and_wait_for_success(&packet).await?;
        }
        Ok(())
    }

    pub async fn validate_microapp(&self, index: u8, protocol: u8) -> Result<ResultValue> {
        self.slot_command(ControlType::MicroappValidate, index, protocol).await
    }

    pub async fn enable_microapp(&self, index: u8, protocol: u8) -> Result<ResultValue> {
        self.slot_command(ControlType::MicroappEnable, index, protocol).await
    }

    pub async fn disable_microapp(&self, index: u8, protocol: u8) -> Result<ResultValue> {
        self.slot_command(ControlType::MicroappDisable, index, protocol).await
    }

    /// Erase slot `index`; erasing flash reports `WaitForSuccess` first.
    pub async fn remove_microapp(&self, index: u8, protocol: u8) -> Result<()> {
        let packet = header_packet(ControlType::MicroappRemove, index, protocol);
        self.control.write_control_and_wait_for_success(&packet).await?;
        info!("Removed microapp {}", index);
        Ok(())
    }

    async fn slot_command(&self, control_type: ControlType, index: u8, protocol: u8) -> Result<ResultValue> {
        let packet = header_packet(control_type, index, protocol);
        let result = self.control.write_control_and_get_result(&packet).await?;
        info!("{:?} on microapp {}: {:?}", control_type, index, result.result);
        Ok(result.result)
    }
}

fn header_packet(control_type: ControlType, index: u8, protocol: u8) -> ControlPacket {
    ControlPacket::new(control_type).with_payload(&MicroappHeader::new(index, protocol).serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::control::ControlConfig;
    use crate::testing::{accepted, Reply, ScriptedGateway};
    use meshuart_shared::ResultPacket;
    use std::time::Duration;

    fn setup(replies: Vec<Reply>) -> (Arc<ScriptedGateway>, MicroappHandler) {
        let bus = EventBus::new();
        let gateway = Arc::new(ScriptedGateway::new(&bus, replies));
        let control = ControlHandler::new(bus, gateway.clone(), ControlConfig::default());
        (gateway, MicroappHandler::new(Arc::new(control)))
    }

    fn upload_ok() -> Reply {
        vec![accepted(ControlType::MicroappUpload, ResultValue::Success)]
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_chunks_with_padding() {
        let (gateway, microapp) = setup(vec![upload_ok(), upload_ok(), upload_ok()]);
        let data: Vec<u8> = (0..10).collect();

        microapp
            .upload_microapp(&data, 1, 0, 4)
            .await
            .expect("upload failed");

        let uploads: Vec<Vec<u8>> = gateway
            .controls()
            .into_iter()
            .map(|control| {
                assert_eq!(control.control_type(), ControlType::MicroappUpload);
                control.payload().to_vec()
            })
            .collect();
        assert_eq!(
            uploads,
            vec![
                vec![0, 1, 0, 0, 0, 1, 2, 3],
                vec![0, 1, 4, 0, 4, 5, 6, 7],
                vec![0, 1, 8, 0, 8, 9, 0xFF, 0xFF],
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_stops_at_failed_chunk() {
        let (gateway, microapp) = setup(vec![
            upload_ok(),
            vec![accepted(ControlType::MicroappUpload, ResultValue::NoSpace)],
        ]);

        let result = microapp.upload_microapp(&[0u8; 300], 0, 0, 128).await;
        assert!(matches!(result, Err(UartError::CommandFailed { code: ResultValue::NoSpace, .. })));
        assert_eq!(gateway.frames().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_arguments() {
        let (gateway, microapp) = setup(vec![]);

        assert!(matches!(
            microapp.upload_microapp(&[1, 2, 3], 0, 0, 0).await,
            Err(UartError::InvalidChunkSize(0))
        ));
        assert!(matches!(
            microapp.upload_microapp(&[1, 2, 3], 0, 0, 70_000).await,
            Err(UartError::InvalidChunkSize(70_000))
        ));
        let huge = vec![0u8; 70_000];
        assert!(matches!(
            microapp.upload_microapp(&huge, 0, 0, 128).await,
            Err(UartError::MicroappTooLarge { size: 70_000 })
        ));
        assert!(gateway.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_info() {
        let info = [1, 4, 0x00, 0x40, 128, 0, 0x00, 0x08, 0, 1];
        let result = ResultPacket::new(ControlType::MicroappGetInfo, ResultValue::Success)
            .with_payload(info.to_vec());
        let (_gateway, microapp) = setup(vec![vec![(Duration::ZERO, result.into())]]);

        let info = microapp.get_microapp_info().await.expect("info failed");
        assert_eq!(info.max_apps, 4);
        assert_eq!(info.max_chunk_size, 128);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_info_requires_success() {
        let (_gateway, microapp) = setup(vec![vec![accepted(
            ControlType::MicroappGetInfo,
            ResultValue::UnknownType,
        )]]);

        assert!(matches!(
            microapp.get_microapp_info().await,
            Err(UartError::CommandFailed { code: ResultValue::UnknownType, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_reports_code() {
        let (gateway, microapp) = setup(vec![vec![accepted(
            ControlType::MicroappValidate,
            ResultValue::Mismatch,
        )]]);

        assert_eq!(
            microapp.validate_microapp(2, 0).await.expect("validate failed"),
            ResultValue::Mismatch
        );
        assert_eq!(gateway.controls()[0].payload(), &[0, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_waits_for_success() {
        let (_gateway, microapp) = setup(vec![vec![
            accepted(ControlType::MicroappRemove, ResultValue::WaitForSuccess),
            (
                Duration::from_millis(500),
                ResultPacket::new(ControlType::MicroappRemove, ResultValue::Success).into(),
            ),
        ]]);

        microapp.remove_microapp(0, 0).await.expect("remove failed");
    }
}
