//! Commands sent through the mesh and the results they produce

mod handler;
mod result;

pub use handler::{switch_value, MeshConfig, MeshHandler, SWITCH_OFF, SWITCH_ON};
pub use result::MeshResult;
