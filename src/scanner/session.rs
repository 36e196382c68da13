//! Scan lifecycle state, sweep plan, and progress reporting
//!
//! A scan visits every `(rotation, tilt)` pair of its [`SweepPlan`] in raster
//! order: rotation is the outer axis, tilt the inner one, and tilt always
//! sweeps low to high. One full tilt sweep at a fixed rotation is a cycle.
//!
//! ```text
//! State machine:
//!
//!   Idle ----start----> Scanning --exhausted--> Complete
//!    ^                    |  ^
//!    |                  pause resume
//!    |                    v  |
//!    |                   Paused
//!    |                    |
//!    +--home-- Stopping <-+--stop   (also Scanning --stop--> Stopping)
//!
//!   Scanning/Paused --fault/threshold--> Error
//!   Idle/Complete/Error --reset--> Idle (store + session cleared)
//! ```

use crate::config::ScanConfig;
use serde::{Deserialize, Serialize};

/// Floating-point slack when comparing sweep positions against range bounds
const ANGLE_EPS: f64 = 1e-9;

/// Scanner lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// No scan in progress, rig parked
    Idle,
    /// Sweep worker actively sampling
    Scanning,
    /// Sweep suspended at a sample boundary, position held
    Paused,
    /// Stop accepted, rig homing
    Stopping,
    /// Sweep finished, point cloud retained
    Complete,
    /// Fatal fault, explicit reset required
    Error,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Paused => "paused",
            ScanState::Stopping => "stopping",
            ScanState::Complete => "complete",
            ScanState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Precomputed sweep positions for one scan
#[derive(Debug, Clone)]
pub struct SweepPlan {
    /// Tilt stops in degrees, low to high, inclusive of both bounds
    pub tilt_positions: Vec<f64>,
    /// Rotation stops in degrees, `[0, 360)` exclusive of 360
    pub rotation_positions: Vec<f64>,
}

impl SweepPlan {
    /// Build the sweep plan from validated scan configuration
    ///
    /// When the tilt range does not divide evenly by the step, the final
    /// position is clamped to `tilt_max_deg` so the boundary is always
    /// sampled. Rotation starts at 0 and never revisits it.
    pub fn from_config(config: &ScanConfig) -> Self {
        let mut tilt_positions = Vec::new();
        let mut angle = config.tilt_min_deg;
        while angle < config.tilt_max_deg - ANGLE_EPS {
            tilt_positions.push(angle);
            angle += config.tilt_step_deg;
        }
        tilt_positions.push(config.tilt_max_deg);

        let mut rotation_positions = Vec::new();
        let mut angle = 0.0;
        while angle < 360.0 - ANGLE_EPS {
            rotation_positions.push(angle);
            angle += config.rotation_step_deg;
        }

        Self {
            tilt_positions,
            rotation_positions,
        }
    }

    /// Total number of planned samples
    pub fn total_samples(&self) -> usize {
        self.tilt_positions.len() * self.rotation_positions.len()
    }
}

/// Per-run sweep bookkeeping, owned by the worker thread
#[derive(Debug)]
pub struct ScanSession {
    plan: SweepPlan,
    rotation_idx: usize,
    tilt_idx: usize,
    /// Set once `advance` runs off the end of the plan; the indices then stay
    /// parked on the final position
    exhausted: bool,
    /// Samples stored so far (dropped samples excluded)
    pub completed_samples: usize,
    /// Samples the plan calls for, fixed at start
    pub total_planned: usize,
    /// Failed or out-of-range readings skipped over
    pub dropped_samples: usize,
    /// Rolling count of consecutive failed readings, reset on success
    pub consecutive_failures: u32,
    /// Scan start time, microseconds since the Unix epoch
    pub started_at_us: u64,
}

impl ScanSession {
    /// Begin a new session at the first sweep position
    pub fn new(plan: SweepPlan, started_at_us: u64) -> Self {
        let total_planned = plan.total_samples();
        Self {
            plan,
            rotation_idx: 0,
            tilt_idx: 0,
            exhausted: false,
            completed_samples: 0,
            total_planned,
            dropped_samples: 0,
            consecutive_failures: 0,
            started_at_us,
        }
    }

    /// Tilt angle of the current sample position
    pub fn current_tilt(&self) -> f64 {
        self.plan.tilt_positions[self.tilt_idx]
    }

    /// Rotation angle of the current sample position
    pub fn current_rotation(&self) -> f64 {
        self.plan.rotation_positions[self.rotation_idx]
    }

    /// True when the current sample is the first of its tilt cycle, meaning
    /// the turntable must move before sampling
    pub fn at_cycle_start(&self) -> bool {
        self.tilt_idx == 0
    }

    /// 1-based cycle number of the current position
    pub fn current_cycle(&self) -> usize {
        self.rotation_idx + 1
    }

    /// Number of tilt cycles in the plan
    pub fn total_cycles(&self) -> usize {
        self.plan.rotation_positions.len()
    }

    /// Step to the next `(rotation, tilt)` position; returns `true` when the
    /// sweep is exhausted
    ///
    /// After exhaustion the indices stay on the final position, so
    /// `current_tilt`/`current_rotation` remain valid for the closing
    /// progress report.
    pub fn advance(&mut self) -> bool {
        if self.tilt_idx + 1 < self.plan.tilt_positions.len() {
            self.tilt_idx += 1;
        } else if self.rotation_idx + 1 < self.plan.rotation_positions.len() {
            self.tilt_idx = 0;
            self.rotation_idx += 1;
        } else {
            self.exhausted = true;
        }
        self.exhausted
    }

    /// Completion percentage against the fixed plan
    ///
    /// Dropped samples still advance the sweep, so a finished scan reports
    /// 100% even when some positions yielded no point.
    pub fn progress_percent(&self) -> f64 {
        let visited = self.completed_samples + self.dropped_samples;
        visited as f64 / self.total_planned as f64 * 100.0
    }
}

/// Progress snapshot published with every stored sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub state: ScanState,
    /// Current tilt position in degrees
    pub tilt_deg: f64,
    /// Current rotation position in degrees
    pub rotation_deg: f64,
    /// Points stored so far
    pub points_collected: usize,
    /// Percent of the planned sweep visited
    pub progress_percent: f64,
    /// 1-based current tilt cycle
    pub current_cycle: usize,
    /// Total tilt cycles in the plan
    pub total_cycles: usize,
    /// Failed or out-of-range readings skipped over
    pub dropped_samples: usize,
}

impl ScanProgress {
    /// Progress snapshot for a scanner with no active session
    pub fn idle(state: ScanState) -> Self {
        Self {
            state,
            tilt_deg: 0.0,
            rotation_deg: 0.0,
            points_collected: 0,
            progress_percent: 0.0,
            current_cycle: 0,
            total_cycles: 0,
            dropped_samples: 0,
        }
    }
}
