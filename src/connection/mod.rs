//! Connection management for the gateway's serial link
//!
//! This module handles:
//! - Opening the link with automatic reconnection
//! - Writing queued frames
//! - Decoding inbound frames and publishing them on the event bus

mod manager;

pub use manager::{publish_uart_message, ConnectionEvent, UartConfig, UartConnection};
