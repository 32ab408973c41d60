pub mod serial;
pub mod traits;

pub use serial::{SerialConnector, SerialTransportStream, DEFAULT_BAUD_RATE};
pub use traits::{TransportConnector, TransportStream, TransportWriter};
