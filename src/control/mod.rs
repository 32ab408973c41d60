//! Direct control commands to the gateway's own firmware

mod handler;
mod microapp;

pub use handler::{ControlConfig, ControlHandler};
pub use microapp::MicroappHandler;
