//! Scan coordinator: state machine and sweep worker
//!
//! One dedicated worker thread owns the rig and the per-run session. The
//! control side (network receiver, signal handler, tests) talks to it over a
//! request channel; each request carries a one-shot reply channel so callers
//! get the resulting state or the rejection synchronously.
//!
//! While `Scanning` the worker drains pending commands once per sample, then
//! performs exactly one `(rotation, tilt)` sample. The command check is the
//! only suspension point, so pause, stop, and fault handling always land on a
//! sample boundary and never tear a sample in half. In every other state the
//! worker blocks on the channel and consumes no CPU.

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::rig::ScanRig;
use crate::scanner::now_us;
use crate::scanner::point_cloud::{PointCloudStore, ScanPoint};
use crate::scanner::session::{ScanProgress, ScanSession, ScanState, SweepPlan};
use crate::streaming::messages::ScanEvent;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Control commands accepted by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
}

impl ScanCommand {
    /// Wire/diagnostic name of the command
    pub fn name(&self) -> &'static str {
        match self {
            ScanCommand::Start => "start",
            ScanCommand::Pause => "pause",
            ScanCommand::Resume => "resume",
            ScanCommand::Stop => "stop",
            ScanCommand::Reset => "reset",
        }
    }
}

/// Fire-and-forget outlet for scan events
///
/// Publishing must never block the worker; a sink with no consumer simply
/// discards events.
pub trait EventSink: Send {
    fn publish(&self, event: ScanEvent);
}

/// [`EventSink`] backed by an unbounded channel sender
pub struct ChannelSink {
    tx: Sender<ScanEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ScanEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: ScanEvent) {
        // A disconnected receiver just means nobody is listening
        let _ = self.tx.send(event);
    }
}

enum CtrlRequest {
    Command {
        cmd: ScanCommand,
        reply: Sender<Result<ScanState>>,
    },
    Shutdown,
}

/// Worker-owned state mirrored for lock-free-ish observation by the handle
struct SharedStatus {
    state: Mutex<ScanState>,
    progress: Mutex<ScanProgress>,
    last_error: Mutex<Option<String>>,
}

/// Handle to the scan worker thread
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Dropping the
/// last handle shuts the worker down, stopping and homing an active scan
/// first.
pub struct ScanCoordinator {
    ctrl_tx: Sender<CtrlRequest>,
    status: Arc<SharedStatus>,
    worker: Option<JoinHandle<()>>,
}

impl ScanCoordinator {
    /// Spawn the worker thread and return the control handle
    pub fn new(
        rig: Box<dyn ScanRig>,
        config: ScanConfig,
        store: Arc<PointCloudStore>,
        events: Box<dyn EventSink>,
    ) -> Result<Self> {
        let (ctrl_tx, ctrl_rx) = crossbeam_channel::unbounded();
        let status = Arc::new(SharedStatus {
            state: Mutex::new(ScanState::Idle),
            progress: Mutex::new(ScanProgress::idle(ScanState::Idle)),
            last_error: Mutex::new(None),
        });

        let worker_status = Arc::clone(&status);
        let worker = thread::Builder::new()
            .name("scan-worker".to_string())
            .spawn(move || {
                let mut worker = Worker {
                    rig,
                    config,
                    store,
                    events,
                    ctrl_rx,
                    status: worker_status,
                    session: None,
                    batch: Vec::new(),
                    last_flush: Instant::now(),
                };
                worker.run();
            })?;

        Ok(Self {
            ctrl_tx,
            status,
            worker: Some(worker),
        })
    }

    /// Submit a control command and wait for the worker's verdict
    pub fn command(&self, cmd: ScanCommand) -> Result<ScanState> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.ctrl_tx
            .send(CtrlRequest::Command {
                cmd,
                reply: reply_tx,
            })
            .map_err(|_| Error::ChannelClosed)?;
        reply_rx.recv().map_err(|_| Error::ChannelClosed)?
    }

    pub fn start(&self) -> Result<ScanState> {
        self.command(ScanCommand::Start)
    }

    pub fn pause(&self) -> Result<ScanState> {
        self.command(ScanCommand::Pause)
    }

    pub fn resume(&self) -> Result<ScanState> {
        self.command(ScanCommand::Resume)
    }

    pub fn stop(&self) -> Result<ScanState> {
        self.command(ScanCommand::Stop)
    }

    pub fn reset(&self) -> Result<ScanState> {
        self.command(ScanCommand::Reset)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScanState {
        *self
            .status
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> ScanProgress {
        let mut progress = *self
            .status
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        progress.state = self.state();
        progress
    }

    /// Diagnostic message of the most recent fatal fault, if any
    pub fn last_error(&self) -> Option<String> {
        self.status
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        let _ = self.ctrl_tx.send(CtrlRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Scan worker panicked during shutdown");
            }
        }
    }
}

struct Worker {
    rig: Box<dyn ScanRig>,
    config: ScanConfig,
    store: Arc<PointCloudStore>,
    events: Box<dyn EventSink>,
    ctrl_rx: Receiver<CtrlRequest>,
    status: Arc<SharedStatus>,
    session: Option<ScanSession>,
    batch: Vec<[f64; 3]>,
    last_flush: Instant,
}

impl Worker {
    fn run(&mut self) {
        info!("Scan worker started");
        loop {
            if self.state() == ScanState::Scanning {
                // Drain pending commands, then take exactly one sample
                while let Ok(request) = self.ctrl_rx.try_recv() {
                    if self.handle(request) {
                        return;
                    }
                }
                if self.state() == ScanState::Scanning {
                    self.step_sample();
                }
            } else {
                match self.ctrl_rx.recv() {
                    Ok(request) => {
                        if self.handle(request) {
                            return;
                        }
                    }
                    // All handles dropped without an explicit shutdown
                    Err(_) => return,
                }
            }
        }
    }

    /// Process one control request; returns `true` on shutdown
    fn handle(&mut self, request: CtrlRequest) -> bool {
        match request {
            CtrlRequest::Command { cmd, reply } => {
                let result = self.apply(cmd);
                if let Err(e) = &result {
                    debug!("Command '{}' rejected: {}", cmd.name(), e);
                }
                let _ = reply.send(result);
                false
            }
            CtrlRequest::Shutdown => {
                info!("Scan worker shutting down");
                if matches!(self.state(), ScanState::Scanning | ScanState::Paused) {
                    if let Err(e) = self.do_stop() {
                        warn!("Stop during shutdown failed: {}", e);
                    }
                }
                true
            }
        }
    }

    fn apply(&mut self, cmd: ScanCommand) -> Result<ScanState> {
        let state = self.state();
        match (cmd, state) {
            (ScanCommand::Start, ScanState::Idle) => {
                self.store.clear();
                let plan = SweepPlan::from_config(&self.config);
                let session = ScanSession::new(plan, now_us());
                info!(
                    "Starting scan: {} samples ({} cycles of {} tilt positions)",
                    session.total_planned,
                    session.total_cycles(),
                    session.total_planned / session.total_cycles().max(1)
                );
                self.session = Some(session);
                self.batch.clear();
                self.last_flush = Instant::now();
                self.set_last_error(None);
                self.set_state(ScanState::Scanning, None);
                self.publish_progress();
                Ok(ScanState::Scanning)
            }
            (ScanCommand::Pause, ScanState::Scanning) => {
                info!("Scan paused");
                self.set_state(ScanState::Paused, None);
                Ok(ScanState::Paused)
            }
            (ScanCommand::Resume, ScanState::Paused) => {
                info!("Scan resumed");
                self.set_state(ScanState::Scanning, None);
                Ok(ScanState::Scanning)
            }
            (ScanCommand::Stop, ScanState::Scanning | ScanState::Paused) => self.do_stop(),
            (
                ScanCommand::Reset,
                ScanState::Idle | ScanState::Complete | ScanState::Error,
            ) => {
                info!("Resetting scanner");
                self.store.clear();
                self.session = None;
                self.set_last_error(None);
                *self
                    .status
                    .progress
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = ScanProgress::idle(ScanState::Idle);
                self.set_state(ScanState::Idle, None);
                Ok(ScanState::Idle)
            }
            (cmd, state) => Err(Error::InvalidTransition {
                command: cmd.name(),
                state,
            }),
        }
    }

    /// Take one sample at the session's current position and advance
    fn step_sample(&mut self) {
        let (tilt, rotation, cycle_start) = match &self.session {
            Some(session) => (
                session.current_tilt(),
                session.current_rotation(),
                session.at_cycle_start(),
            ),
            None => return,
        };

        if cycle_start {
            if let Err(e) = self.rig.rotate_to(rotation) {
                self.fail_actuator("rotate", tilt, rotation, e);
                return;
            }
        }
        if let Err(e) = self.rig.set_tilt(tilt) {
            self.fail_actuator("tilt", tilt, rotation, e);
            return;
        }

        thread::sleep(self.config.settle_delay());

        let reading = self.rig.read_distance();
        let max_range = self.config.sensor_max_range_mm;
        let stored = match reading {
            Ok(range_mm) if (0.0..=max_range).contains(&range_mm) => {
                let point = ScanPoint::from_spherical(tilt, rotation, range_mm, now_us());
                self.store.append(point);
                self.batch.push(point.xyz());
                if let Some(session) = self.session.as_mut() {
                    session.completed_samples += 1;
                    session.consecutive_failures = 0;
                }
                true
            }
            Ok(range_mm) => {
                debug!(
                    "Reading {:.1}mm out of range at tilt {:.1} rotation {:.1}, sample dropped",
                    range_mm, tilt, rotation
                );
                false
            }
            Err(e) => {
                warn!(
                    "Sensor read failed at tilt {:.1} rotation {:.1}: {}",
                    tilt, rotation, e
                );
                false
            }
        };

        if !stored {
            let threshold = self.config.failure_threshold;
            let failures = match self.session.as_mut() {
                Some(session) => {
                    session.dropped_samples += 1;
                    session.consecutive_failures += 1;
                    session.consecutive_failures
                }
                None => return,
            };
            if failures >= threshold {
                let reason = Error::ThresholdExceeded { threshold }.to_string();
                error!("Aborting scan: {}", reason);
                self.flush_batch();
                self.set_last_error(Some(reason.clone()));
                // State change first so the closing progress report already
                // carries the error state
                self.set_state(ScanState::Error, Some(reason));
                self.publish_progress();
                return;
            }
        }

        self.publish_progress();

        if self.batch.len() >= self.config.batch_size
            || (!self.batch.is_empty()
                && self.last_flush.elapsed() >= self.config.batch_interval())
        {
            self.flush_batch();
        }

        let done = match self.session.as_mut() {
            Some(session) => session.advance(),
            None => return,
        };
        if done {
            self.flush_batch();
            info!("Scan complete: {} points stored", self.store.len());
            self.set_state(ScanState::Complete, None);
            self.publish_progress();
        }
    }

    /// Stop the sweep, home the rig, and return to idle
    fn do_stop(&mut self) -> Result<ScanState> {
        info!("Stopping scan at {} points", self.store.len());
        self.set_state(ScanState::Stopping, None);
        self.flush_batch();
        match self.rig.home() {
            Ok(()) => {
                self.session = None;
                self.set_state(ScanState::Idle, None);
                Ok(ScanState::Idle)
            }
            Err(e) => {
                let reason = format!("Homing failed during stop: {}", e);
                error!("{}", reason);
                self.set_last_error(Some(reason.clone()));
                self.set_state(ScanState::Error, Some(reason));
                Err(e)
            }
        }
    }

    /// Record an actuator fault and abort the scan
    fn fail_actuator(&mut self, axis: &str, tilt: f64, rotation: f64, err: Error) {
        let reason = format!(
            "Actuator fault on {} axis (last good position: tilt {:.1} rotation {:.1}): {}",
            axis, tilt, rotation, err
        );
        error!("{}", reason);
        self.flush_batch();
        self.set_last_error(Some(reason.clone()));
        self.set_state(ScanState::Error, Some(reason));
    }

    fn flush_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let points = std::mem::take(&mut self.batch);
        debug!("Flushing batch of {} points", points.len());
        self.events.publish(ScanEvent::PointsBatch { points });
        self.last_flush = Instant::now();
    }

    fn publish_progress(&self) {
        let progress = match &self.session {
            Some(session) => ScanProgress {
                state: self.state(),
                tilt_deg: session.current_tilt(),
                rotation_deg: session.current_rotation(),
                points_collected: self.store.len(),
                progress_percent: session.progress_percent(),
                current_cycle: session.current_cycle(),
                total_cycles: session.total_cycles(),
                dropped_samples: session.dropped_samples,
            },
            None => ScanProgress::idle(self.state()),
        };
        *self
            .status
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = progress;
        self.events.publish(ScanEvent::Progress(progress));
    }

    fn state(&self) -> ScanState {
        *self
            .status
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ScanState, reason: Option<String>) {
        *self
            .status
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = state;
        self.status
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state = state;
        self.events.publish(ScanEvent::StateChanged { state, reason });
    }

    fn set_last_error(&self, message: Option<String>) {
        *self
            .status
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::sim::{SimProfile, SimRig};
    use std::time::Duration;

    /// Rig whose tilt axis faults immediately
    struct SeizedTiltRig;

    impl ScanRig for SeizedTiltRig {
        fn set_tilt(&mut self, angle_deg: f64) -> Result<()> {
            Err(Error::ActuatorFault(format!(
                "tilt axis seized at command {}",
                angle_deg
            )))
        }
        fn rotate_to(&mut self, _angle_deg: f64) -> Result<()> {
            Ok(())
        }
        fn read_distance(&mut self) -> Result<f64> {
            Ok(500.0)
        }
        fn home(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn tiny_config() -> ScanConfig {
        // 2 tilt positions x 2 rotations = 4 samples, no settle delay
        ScanConfig {
            tilt_min_deg: 0.0,
            tilt_max_deg: 90.0,
            tilt_step_deg: 90.0,
            rotation_step_deg: 180.0,
            settle_delay_ms: 0,
            ..ScanConfig::default()
        }
    }

    fn wait_for_state(coordinator: &ScanCoordinator, target: ScanState) {
        for _ in 0..200 {
            if coordinator.state() == target {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!(
            "timed out waiting for state {}, still in {}",
            target,
            coordinator.state()
        );
    }

    fn sim_coordinator(config: ScanConfig) -> (ScanCoordinator, Arc<PointCloudStore>) {
        let rig = SimRig::new(SimProfile::Constant { range_mm: 1000.0 });
        let store = Arc::new(PointCloudStore::new());
        let (event_tx, _event_rx) = crossbeam_channel::unbounded();
        let coordinator = ScanCoordinator::new(
            Box::new(rig),
            config,
            Arc::clone(&store),
            Box::new(ChannelSink::new(event_tx)),
        )
        .unwrap();
        (coordinator, store)
    }

    #[test]
    fn test_tiny_scan_runs_to_complete() {
        let (coordinator, store) = sim_coordinator(tiny_config());
        assert_eq!(coordinator.start().unwrap(), ScanState::Scanning);
        wait_for_state(&coordinator, ScanState::Complete);
        assert_eq!(store.len(), 4);
        let progress = coordinator.progress();
        assert_eq!(progress.points_collected, 4);
        assert!((progress.progress_percent - 100.0).abs() < 1e-9);
        assert_eq!(progress.dropped_samples, 0);
        // The closing report carries the final sweep position
        assert_eq!(progress.tilt_deg, 90.0);
        assert_eq!(progress.rotation_deg, 180.0);
        assert_eq!(progress.current_cycle, 2);
        assert_eq!(progress.total_cycles, 2);
    }

    #[test]
    fn test_start_rejected_while_complete_until_reset() {
        let (coordinator, store) = sim_coordinator(tiny_config());
        coordinator.start().unwrap();
        wait_for_state(&coordinator, ScanState::Complete);

        match coordinator.start() {
            Err(Error::InvalidTransition { command, state }) => {
                assert_eq!(command, "start");
                assert_eq!(state, ScanState::Complete);
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
        // Rejection leaves state and store untouched
        assert_eq!(coordinator.state(), ScanState::Complete);
        assert_eq!(store.len(), 4);

        assert_eq!(coordinator.reset().unwrap(), ScanState::Idle);
        assert!(store.is_empty());
        assert_eq!(coordinator.start().unwrap(), ScanState::Scanning);
        wait_for_state(&coordinator, ScanState::Complete);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_invalid_commands_rejected_in_idle() {
        let (coordinator, _store) = sim_coordinator(tiny_config());
        for cmd in [ScanCommand::Pause, ScanCommand::Resume, ScanCommand::Stop] {
            match coordinator.command(cmd) {
                Err(Error::InvalidTransition { command, state }) => {
                    assert_eq!(command, cmd.name());
                    assert_eq!(state, ScanState::Idle);
                }
                other => panic!("expected InvalidTransition for {:?}, got {:?}", cmd, other),
            }
        }
        // Reset from idle is a no-op but valid
        assert_eq!(coordinator.reset().unwrap(), ScanState::Idle);
    }

    #[test]
    fn test_actuator_fault_moves_to_error_with_diagnostics() {
        let store = Arc::new(PointCloudStore::new());
        let (event_tx, _event_rx) = crossbeam_channel::unbounded();
        let coordinator = ScanCoordinator::new(
            Box::new(SeizedTiltRig),
            tiny_config(),
            Arc::clone(&store),
            Box::new(ChannelSink::new(event_tx)),
        )
        .unwrap();

        coordinator.start().unwrap();
        wait_for_state(&coordinator, ScanState::Error);
        assert!(store.is_empty());
        let diagnostic = coordinator.last_error().unwrap();
        assert!(diagnostic.contains("tilt"), "diagnostic: {}", diagnostic);

        // Only reset leaves the error state
        assert!(coordinator.start().is_err());
        assert_eq!(coordinator.reset().unwrap(), ScanState::Idle);
        assert!(coordinator.last_error().is_none());
    }

    #[test]
    fn test_events_cover_lifecycle_and_points() {
        let rig = SimRig::new(SimProfile::Constant { range_mm: 1000.0 });
        let store = Arc::new(PointCloudStore::new());
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let coordinator = ScanCoordinator::new(
            Box::new(rig),
            tiny_config(),
            Arc::clone(&store),
            Box::new(ChannelSink::new(event_tx)),
        )
        .unwrap();

        coordinator.start().unwrap();
        wait_for_state(&coordinator, ScanState::Complete);

        let mut states = Vec::new();
        let mut batched_points = 0;
        let mut progress_events = 0;
        while let Ok(event) = event_rx.try_recv() {
            match event {
                ScanEvent::StateChanged { state, .. } => states.push(state),
                ScanEvent::PointsBatch { points } => batched_points += points.len(),
                ScanEvent::Progress(_) => progress_events += 1,
            }
        }
        assert_eq!(states, vec![ScanState::Scanning, ScanState::Complete]);
        assert_eq!(batched_points, 4);
        assert!(progress_events >= 4);
    }

    #[test]
    fn test_abort_event_stream_reports_error_state() {
        // Read 0 succeeds, reads 1-2 fail and hit the threshold
        let rig = SimRig::new(SimProfile::Constant { range_mm: 1000.0 })
            .with_failure_window(1, 2);
        let store = Arc::new(PointCloudStore::new());
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let coordinator = ScanCoordinator::new(
            Box::new(rig),
            ScanConfig {
                failure_threshold: 2,
                ..tiny_config()
            },
            Arc::clone(&store),
            Box::new(ChannelSink::new(event_tx)),
        )
        .unwrap();

        coordinator.start().unwrap();
        wait_for_state(&coordinator, ScanState::Error);

        let mut saw_error_change = false;
        let mut last_progress = None;
        while let Ok(event) = event_rx.try_recv() {
            match event {
                ScanEvent::StateChanged {
                    state: ScanState::Error,
                    reason,
                } => {
                    saw_error_change = true;
                    assert!(reason.unwrap().contains("threshold"));
                }
                ScanEvent::Progress(progress) => {
                    // No progress event in the scanning state follows the
                    // error transition
                    if saw_error_change {
                        assert_eq!(progress.state, ScanState::Error);
                    }
                    last_progress = Some(progress);
                }
                _ => {}
            }
        }
        assert!(saw_error_change);
        let final_progress = last_progress.unwrap();
        assert_eq!(final_progress.state, ScanState::Error);
        assert_eq!(final_progress.dropped_samples, 2);
    }
}
