//! Error types for DrishtiIO

use crate::scanner::session::ScanState;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// DrishtiIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rig adapter failed to initialize (fatal at startup)
    #[error("Adapter initialization failed: {0}")]
    AdapterInit(String),

    /// Unknown rig type in configuration
    #[error("Unknown rig type: {0}")]
    UnknownRig(String),

    /// Single failed distance reading (transient, sample dropped)
    #[error("Sensor read failed: {0}")]
    SensorRead(String),

    /// Motion command failed (fatal within a scan)
    #[error("Actuator fault: {0}")]
    ActuatorFault(String),

    /// Command not valid for the current scanner state
    #[error("Command '{command}' not valid in state '{state}'")]
    InvalidTransition {
        /// Rejected command name
        command: &'static str,
        /// State the scanner was in when the command arrived
        state: ScanState,
    },

    /// Consecutive sensor read failures reached the configured threshold
    #[error("Consecutive sensor failures reached threshold ({threshold})")]
    ThresholdExceeded {
        /// Configured consecutive-failure threshold
        threshold: u32,
    },

    /// Wire serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Control or event channel closed (worker gone)
    #[error("Control channel closed")]
    ChannelClosed,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
