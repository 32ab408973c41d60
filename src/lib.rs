//! Mesh gateway driver over UART
//!
//! Commands go out as framed control packets; whatever the gateway sends back
//! is decoded and published on an [`EventBus`]. The handlers correlate those
//! events with the commands that caused them.

pub mod bus;
pub mod collector;
pub mod connection;
pub mod control;
pub mod error;
pub mod mesh;
mod retry;
pub mod transport;
mod uart;

#[cfg(test)]
mod testing;

pub use bus::{EventBus, Topic};
pub use connection::{ConnectionEvent, UartConfig, UartConnection};
pub use control::{ControlConfig, ControlHandler, MicroappHandler};
pub use error::{Result, UartError};
pub use mesh::{MeshConfig, MeshHandler, MeshResult};
pub use retry::BusyRetry;
pub use uart::MeshUart;
