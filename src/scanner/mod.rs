//! Scan coordination core
//!
//! - [`coordinator::ScanCoordinator`]: state machine and sweep worker
//! - [`point_cloud::PointCloudStore`]: thread-safe accumulated point cloud
//! - [`session`]: scan lifecycle state, sweep plan, and progress types

pub mod coordinator;
pub mod point_cloud;
pub mod session;

pub use coordinator::{ChannelSink, EventSink, ScanCommand, ScanCoordinator};
pub use point_cloud::{PointCloudStore, ScanPoint};
pub use session::{ScanProgress, ScanSession, ScanState, SweepPlan};

/// Current wall-clock time in microseconds since the Unix epoch
pub(crate) fn now_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
