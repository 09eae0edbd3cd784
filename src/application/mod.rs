//! Application layer: collaborator ports and the render orchestration core.

pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod ports;
pub mod timing;
