//! One handle for the whole gateway: link, event bus and command handlers

use std::sync::Arc;

use crate::bus::EventBus;
use crate::connection::{UartConfig, UartConnection};
use crate::control::{ControlConfig, ControlHandler, MicroappHandler};
use crate::mesh::{MeshConfig, MeshHandler};
use crate::transport::{SerialConnector, TransportConnector, TransportWriter};

pub struct MeshUart {
    bus: EventBus,
    connection: Arc<UartConnection>,
    mesh: MeshHandler,
    control: Arc<ControlHandler>,
    microapp: MicroappHandler,
}

impl MeshUart {
    /// Open the serial port named in `config` and start the link.
    pub fn start(config: UartConfig, mesh: MeshConfig) -> Self {
        let connector = SerialConnector::new(config.port.clone(), config.baud_rate);
        Self::with_connector(connector, config, mesh, ControlConfig::default())
    }

    pub fn with_connector<C: TransportConnector>(
        connector: C,
        config: UartConfig,
        mesh: MeshConfig,
        control: ControlConfig,
    ) -> Self {
        let bus = EventBus::new();
        let connection = Arc::new(UartConnection::new(connector, config, bus.clone()));
        let writer: Arc<dyn TransportWriter> = connection.clone();

        let control = Arc::new(ControlHandler::new(bus.clone(), writer.clone(), control));
        Self {
            mesh: MeshHandler::new(bus.clone(), writer, mesh),
            microapp: MicroappHandler::new(control.clone()),
            control,
            connection,
            bus,
        }
    }

    /// Subscribe here for hello, log or raw message events.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn connection(&self) -> &UartConnection {
        &self.connection
    }

    pub fn mesh(&self) -> &MeshHandler {
        &self.mesh
    }

    pub fn control(&self) -> &ControlHandler {
        &self.control
    }

    pub fn microapp(&self) -> &MicroappHandler {
        &self.microapp
    }
}
