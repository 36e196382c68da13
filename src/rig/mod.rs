//! Scan rig abstraction
//!
//! A rig is the two-axis actuator stage plus the time-of-flight sensor,
//! exposed as one capability interface. The sweep algorithm never branches on
//! which variant it is driving; the variant is chosen once at construction.

pub mod sim;

use crate::config::Config;
use crate::error::{Error, Result};
pub use sim::{SimRig, SimStats};

/// Capability interface for the scanner hardware stage
///
/// All motion calls block until the axis has physically settled. Distance
/// reads are bounded in time; a timeout or sensor-reported fault surfaces as
/// an error and is treated as a dropped sample by the caller.
pub trait ScanRig: Send {
    /// Move the tilt axis to the given angle in degrees (0-180)
    fn set_tilt(&mut self, angle_deg: f64) -> Result<()>;

    /// Rotate the turntable to the given angle in degrees; wraps modulo 360
    fn rotate_to(&mut self, angle_deg: f64) -> Result<()>;

    /// Read the current distance in millimeters
    fn read_distance(&mut self) -> Result<f64>;

    /// Return both axes to the zero position and release holding torque
    fn home(&mut self) -> Result<()>;
}

/// Create a rig based on configuration
///
/// Physical PWM/I2C board drivers live outside this crate and attach behind
/// the [`ScanRig`] trait; until one is linked in, selecting `"hardware"`
/// reports an adapter initialization error.
pub fn create_rig(config: &Config) -> Result<Box<dyn ScanRig>> {
    match config.rig.rig_type.as_str() {
        "sim" => {
            let rig = SimRig::from_config(&config.rig.sim)?;
            Ok(Box::new(rig))
        }
        "hardware" => Err(Error::AdapterInit(
            "no hardware rig driver is linked into this build".to_string(),
        )),
        other => Err(Error::UnknownRig(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_create_sim_rig() {
        let config = Config::default();
        assert!(create_rig(&config).is_ok());
    }

    #[test]
    fn test_hardware_rig_reports_adapter_init_error() {
        let mut config = Config::default();
        config.rig.rig_type = "hardware".to_string();
        match create_rig(&config) {
            Err(Error::AdapterInit(_)) => {}
            other => panic!("expected AdapterInit error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_rig_type_rejected() {
        let mut config = Config::default();
        config.rig.rig_type = "tachyon".to_string();
        match create_rig(&config) {
            Err(Error::UnknownRig(name)) => assert_eq!(name, "tachyon"),
            other => panic!("expected UnknownRig error, got {:?}", other.map(|_| ())),
        }
    }
}
