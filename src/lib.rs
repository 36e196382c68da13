//! DrishtiIO - Scan coordination library for a two-axis 3D scanner
//!
//! This library provides the core components for driving a tilt/rotation
//! scanning rig with a time-of-flight distance sensor: the sweep coordinator
//! state machine, the point cloud store, the network streaming surface, and
//! file exporters.

pub mod config;
pub mod error;
pub mod export;
pub mod rig;
pub mod scanner;
pub mod streaming;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use rig::{create_rig, ScanRig};
pub use scanner::{
    PointCloudStore, ScanCommand, ScanCoordinator, ScanPoint, ScanProgress, ScanState,
};
