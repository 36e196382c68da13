//! Thread-safe point cloud store
//!
//! The scan worker is the only writer; command handlers, the streaming layer,
//! and exporters read through snapshots. Each append is independently atomic
//! and insertion order is sampling order, which downstream consumers rely on
//! for raster-order playback.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One sampled point with both its spherical origin and Cartesian position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Tilt angle at sampling time, degrees from +Z
    pub tilt_deg: f64,
    /// Turntable rotation at sampling time, degrees from +X
    pub rotation_deg: f64,
    /// Measured distance in millimeters
    pub range_mm: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Sampling wall-clock time, microseconds since the Unix epoch
    pub sampled_at_us: u64,
}

impl ScanPoint {
    /// Convert a spherical sample to a Cartesian point
    ///
    /// Physics convention: tilt is the polar angle from +Z, rotation the
    /// azimuth from +X in the XY plane. Output is in millimeters.
    pub fn from_spherical(
        tilt_deg: f64,
        rotation_deg: f64,
        range_mm: f64,
        sampled_at_us: u64,
    ) -> Self {
        let tilt = tilt_deg.to_radians();
        let rotation = rotation_deg.to_radians();
        Self {
            tilt_deg,
            rotation_deg,
            range_mm,
            x: range_mm * tilt.sin() * rotation.cos(),
            y: range_mm * tilt.sin() * rotation.sin(),
            z: range_mm * tilt.cos(),
            sampled_at_us,
        }
    }

    /// Cartesian coordinates as `[x, y, z]`
    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Append-only ordered collection of sampled points
pub struct PointCloudStore {
    points: Mutex<Vec<ScanPoint>>,
}

impl PointCloudStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            points: Mutex::new(Vec::new()),
        }
    }

    /// Append one point; O(1) amortized
    pub fn append(&self, point: ScanPoint) {
        self.points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(point);
    }

    /// Read-consistent copy of all points in insertion order
    ///
    /// A snapshot taken at time T reflects exactly the points appended
    /// before T; it is never observed mid-mutation.
    pub fn snapshot(&self) -> Vec<ScanPoint> {
        self.points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove all points
    pub fn clear(&self) {
        self.points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of stored points
    pub fn len(&self) -> usize {
        self.points.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when no points are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PointCloudStore {
    fn default() -> Self {
        Self::new()
    }
}
