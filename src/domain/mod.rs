//! Domain layer: the decoded render request and its invariants.

pub mod error;
pub mod mask;
