//! Deterministic simulator rig
//!
//! Simulates the two-axis stage and time-of-flight sensor without hardware.
//! The distance returned is a pure function of (tilt, rotation), so a given
//! configuration always produces an identical point cloud. This keeps the
//! coordinator fully testable: the sweep logic is byte-for-byte the same code
//! path as with a physical rig.
//!
//! Test instrumentation:
//! - [`SimStats`]: shared counters (reads, motion commands, home calls)
//! - failure window: a contiguous range of reads that fail, for exercising
//!   the dropped-sample and failure-threshold paths
//! - read gate: an optional channel the rig blocks on before each reading,
//!   letting tests sequence control commands against sample boundaries

use super::ScanRig;
use crate::config::SimConfig;
use crate::error::{Error, Result};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic distance profile
#[derive(Debug, Clone, Copy)]
pub enum SimProfile {
    /// Constant radius: every sample lies on a sphere
    Constant { range_mm: f64 },
    /// Sinusoidal radius modulation over rotation, a synthetic "fluted" shape
    RadialWave {
        base_mm: f64,
        amplitude_mm: f64,
        period_deg: f64,
    },
}

impl SimProfile {
    /// Distance in millimeters for the given orientation
    fn distance(&self, _tilt_deg: f64, rotation_deg: f64) -> f64 {
        match *self {
            SimProfile::Constant { range_mm } => range_mm,
            SimProfile::RadialWave {
                base_mm,
                amplitude_mm,
                period_deg,
            } => {
                let phase = rotation_deg / period_deg * std::f64::consts::TAU;
                base_mm + amplitude_mm * phase.sin()
            }
        }
    }
}

/// Shared simulator counters, observable while the rig is owned by the worker
#[derive(Debug, Default)]
pub struct SimStats {
    reads_started: AtomicUsize,
    reads_completed: AtomicUsize,
    tilt_moves: AtomicUsize,
    rotate_moves: AtomicUsize,
    home_calls: AtomicUsize,
}

impl SimStats {
    /// Reads begun (including reads currently blocked on the gate)
    pub fn reads_started(&self) -> usize {
        self.reads_started.load(Ordering::SeqCst)
    }

    /// Reads that returned a distance
    pub fn reads_completed(&self) -> usize {
        self.reads_completed.load(Ordering::SeqCst)
    }

    /// Tilt motion commands issued
    pub fn tilt_moves(&self) -> usize {
        self.tilt_moves.load(Ordering::SeqCst)
    }

    /// Rotation motion commands issued
    pub fn rotate_moves(&self) -> usize {
        self.rotate_moves.load(Ordering::SeqCst)
    }

    /// Times the rig was homed
    pub fn home_calls(&self) -> usize {
        self.home_calls.load(Ordering::SeqCst)
    }
}

/// Deterministic simulator implementing [`ScanRig`]
pub struct SimRig {
    profile: SimProfile,
    stats: Arc<SimStats>,
    /// Reads numbered `[start, start + count)` fail (0-based global index)
    failure_window: Option<(usize, usize)>,
    /// When set, each read blocks until a token arrives; a disconnected
    /// sender opens the gate permanently
    read_gate: Option<Receiver<()>>,
    tilt_deg: f64,
    rotation_deg: f64,
}

impl SimRig {
    /// Create a simulator with the given distance profile
    pub fn new(profile: SimProfile) -> Self {
        Self {
            profile,
            stats: Arc::new(SimStats::default()),
            failure_window: None,
            read_gate: None,
            tilt_deg: 0.0,
            rotation_deg: 0.0,
        }
    }

    /// Build a simulator from configuration
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        let profile = match config.profile.as_str() {
            "constant" => SimProfile::Constant {
                range_mm: config.range_mm,
            },
            "radial-wave" => SimProfile::RadialWave {
                base_mm: config.range_mm,
                amplitude_mm: config.amplitude_mm,
                period_deg: config.period_deg,
            },
            other => {
                return Err(Error::Config(format!(
                    "unknown sim profile '{}' (expected 'constant' or 'radial-wave')",
                    other
                )))
            }
        };
        Ok(Self::new(profile))
    }

    /// Handle to the shared counters (survives moving the rig into the worker)
    pub fn stats(&self) -> Arc<SimStats> {
        Arc::clone(&self.stats)
    }

    /// Fail reads numbered `[start, start + count)`, 0-based
    pub fn with_failure_window(mut self, start: usize, count: usize) -> Self {
        self.failure_window = Some((start, count));
        self
    }

    /// Block each read on a gate token until the sender is dropped
    pub fn with_read_gate(mut self, gate: Receiver<()>) -> Self {
        self.read_gate = Some(gate);
        self
    }
}

impl ScanRig for SimRig {
    fn set_tilt(&mut self, angle_deg: f64) -> Result<()> {
        if !(0.0..=180.0).contains(&angle_deg) {
            return Err(Error::ActuatorFault(format!(
                "tilt angle {} out of range [0, 180]",
                angle_deg
            )));
        }
        self.tilt_deg = angle_deg;
        self.stats.tilt_moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rotate_to(&mut self, angle_deg: f64) -> Result<()> {
        self.rotation_deg = angle_deg.rem_euclid(360.0);
        self.stats.rotate_moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_distance(&mut self) -> Result<f64> {
        let index = self.stats.reads_started.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.read_gate {
            // Err means the sender is gone: gate is open from now on
            let _ = gate.recv();
        }

        if let Some((start, count)) = self.failure_window {
            if index >= start && index < start + count {
                return Err(Error::SensorRead(format!(
                    "injected failure at read {}",
                    index
                )));
            }
        }

        let distance = self.profile.distance(self.tilt_deg, self.rotation_deg);
        self.stats.reads_completed.fetch_add(1, Ordering::SeqCst);
        Ok(distance)
    }

    fn home(&mut self) -> Result<()> {
        self.tilt_deg = 0.0;
        self.rotation_deg = 0.0;
        self.stats.home_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
