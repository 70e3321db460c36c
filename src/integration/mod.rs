//! Per-frame projective TSDF integration

pub mod frame;
pub mod params;
pub mod engine;

pub use frame::{Frame, validate_pose};
pub use params::{ComputeDevice, IntegrationParams};
pub use engine::{IntegrationEngine, IntegrationStats};
