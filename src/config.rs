//! Configuration for the DrishtiIO scanner daemon
//!
//! Loads configuration from a TOML file. The `[scan]` section carries the
//! sweep geometry and sampling parameters; `[rig]` selects the actuator/sensor
//! adapter; `[network]` configures the command/streaming surface.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Rig (actuator/sensor adapter) selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RigConfig {
    /// Rig variant: `"sim"` (deterministic simulator) or `"hardware"`
    #[serde(rename = "type", default = "default_rig_type")]
    pub rig_type: String,
    /// Simulator parameters (used when `type = "sim"`)
    #[serde(default)]
    pub sim: SimConfig,
}

/// Deterministic simulator parameters
///
/// The simulated distance is a pure function of (tilt, rotation) so repeated
/// runs with the same configuration produce identical point clouds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimConfig {
    /// Distance profile: `"constant"` or `"radial-wave"`
    #[serde(default = "default_sim_profile")]
    pub profile: String,
    /// Base distance in millimeters
    #[serde(default = "default_sim_range_mm")]
    pub range_mm: f64,
    /// Wave amplitude in millimeters (radial-wave only)
    #[serde(default = "default_sim_amplitude_mm")]
    pub amplitude_mm: f64,
    /// Wave period in degrees of rotation (radial-wave only)
    #[serde(default = "default_sim_period_deg")]
    pub period_deg: f64,
}

/// Sweep geometry and sampling parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Lowest tilt angle in degrees (measured from +Z)
    #[serde(default = "default_tilt_min")]
    pub tilt_min_deg: f64,
    /// Highest tilt angle in degrees
    #[serde(default = "default_tilt_max")]
    pub tilt_max_deg: f64,
    /// Tilt increment per sample in degrees
    #[serde(default = "default_tilt_step")]
    pub tilt_step_deg: f64,
    /// Rotation increment per completed tilt sweep in degrees
    #[serde(default = "default_rotation_step")]
    pub rotation_step_deg: f64,
    /// Settle time after motion before each sensor reading (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Consecutive failed readings that abort the scan
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Maximum valid sensor range in millimeters; readings beyond this are dropped
    #[serde(default = "default_sensor_max_range")]
    pub sensor_max_range_mm: f64,
    /// Points per outbound batch event
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum time between batch flushes (milliseconds)
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
}

/// Network configuration for the command/streaming surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address for inbound commands (e.g. `0.0.0.0:5555`)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// UDP port events are streamed to on the registered client
    #[serde(default = "default_udp_port")]
    pub udp_streaming_port: u16,
}

/// Export configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Directory exported point cloud files are written to
    #[serde(default = "default_export_directory")]
    pub directory: PathBuf,
}

fn default_rig_type() -> String {
    "sim".to_string()
}
fn default_sim_profile() -> String {
    "constant".to_string()
}
fn default_sim_range_mm() -> f64 {
    1000.0
}
fn default_sim_amplitude_mm() -> f64 {
    250.0
}
fn default_sim_period_deg() -> f64 {
    45.0
}
fn default_tilt_min() -> f64 {
    0.0
}
fn default_tilt_max() -> f64 {
    180.0
}
fn default_tilt_step() -> f64 {
    2.0
}
fn default_rotation_step() -> f64 {
    1.0
}
fn default_settle_delay_ms() -> u64 {
    30
}
fn default_failure_threshold() -> u32 {
    10
}
fn default_sensor_max_range() -> f64 {
    4000.0
}
fn default_batch_size() -> usize {
    50
}
fn default_batch_interval_ms() -> u64 {
    200
}
fn default_bind_address() -> String {
    "0.0.0.0:5555".to_string()
}
fn default_udp_port() -> u16 {
    5556
}
fn default_export_directory() -> PathBuf {
    PathBuf::from("scans")
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            rig_type: default_rig_type(),
            sim: SimConfig::default(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            profile: default_sim_profile(),
            range_mm: default_sim_range_mm(),
            amplitude_mm: default_sim_amplitude_mm(),
            period_deg: default_sim_period_deg(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tilt_min_deg: default_tilt_min(),
            tilt_max_deg: default_tilt_max(),
            tilt_step_deg: default_tilt_step(),
            rotation_step_deg: default_rotation_step(),
            settle_delay_ms: default_settle_delay_ms(),
            failure_threshold: default_failure_threshold(),
            sensor_max_range_mm: default_sensor_max_range(),
            batch_size: default_batch_size(),
            batch_interval_ms: default_batch_interval_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            udp_streaming_port: default_udp_port(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: default_export_directory(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rig: RigConfig::default(),
            scan: ScanConfig::default(),
            network: NetworkConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Settle delay as a [`Duration`]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Batch flush interval as a [`Duration`]
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    /// Validate the sweep geometry invariants
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=180.0).contains(&self.tilt_min_deg)
            || !(0.0..=180.0).contains(&self.tilt_max_deg)
        {
            return Err(Error::Config(format!(
                "tilt range [{}, {}] must lie within [0, 180]",
                self.tilt_min_deg, self.tilt_max_deg
            )));
        }
        if self.tilt_min_deg >= self.tilt_max_deg {
            return Err(Error::Config(format!(
                "tilt_min_deg ({}) must be less than tilt_max_deg ({})",
                self.tilt_min_deg, self.tilt_max_deg
            )));
        }
        if self.tilt_step_deg <= 0.0 {
            return Err(Error::Config(format!(
                "tilt_step_deg must be positive, got {}",
                self.tilt_step_deg
            )));
        }
        if self.rotation_step_deg <= 0.0 || self.rotation_step_deg > 360.0 {
            return Err(Error::Config(format!(
                "rotation_step_deg must be in (0, 360], got {}",
                self.rotation_step_deg
            )));
        }
        if self.failure_threshold == 0 {
            return Err(Error::Config(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.sensor_max_range_mm <= 0.0 {
            return Err(Error::Config(format!(
                "sensor_max_range_mm must be positive, got {}",
                self.sensor_max_range_mm
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        config.scan.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.scan.validate().is_ok());
        assert_eq!(config.rig.rig_type, "sim");
        assert_eq!(config.network.bind_address, "0.0.0.0:5555");
        assert_eq!(config.network.udp_streaming_port, 5556);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[rig]"));
        assert!(toml_string.contains("[scan]"));
        assert!(toml_string.contains("[network]"));
        assert!(toml_string.contains("[export]"));

        let parsed: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.scan.tilt_max_deg, config.scan.tilt_max_deg);
        assert_eq!(parsed.scan.batch_size, config.scan.batch_size);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[scan]
tilt_min_deg = 10.0
tilt_max_deg = 170.0
tilt_step_deg = 5.0

[rig]
type = "sim"
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.scan.tilt_min_deg, 10.0);
        assert_eq!(config.scan.tilt_step_deg, 5.0);
        // Unspecified fields fall back to defaults
        assert_eq!(config.scan.rotation_step_deg, 1.0);
        assert_eq!(config.scan.failure_threshold, 10);
        assert_eq!(config.network.udp_streaming_port, 5556);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let path = std::env::temp_dir().join("drishti-config-save-test.toml");
        let _ = fs::remove_file(&path);

        let config = Config {
            scan: ScanConfig {
                tilt_max_deg: 150.0,
                rotation_step_deg: 5.0,
                ..ScanConfig::default()
            },
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.scan.tilt_max_deg, 150.0);
        assert_eq!(loaded.scan.rotation_step_deg, 5.0);
        assert_eq!(loaded.rig.rig_type, config.rig.rig_type);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_validation_rejects_inverted_tilt_range() {
        let scan = ScanConfig {
            tilt_min_deg: 90.0,
            tilt_max_deg: 45.0,
            ..ScanConfig::default()
        };
        assert!(scan.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_bounds_tilt() {
        let scan = ScanConfig {
            tilt_max_deg: 190.0,
            ..ScanConfig::default()
        };
        assert!(scan.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_positive_steps() {
        let scan = ScanConfig {
            tilt_step_deg: 0.0,
            ..ScanConfig::default()
        };
        assert!(scan.validate().is_err());

        let scan = ScanConfig {
            rotation_step_deg: -1.0,
            ..ScanConfig::default()
        };
        assert!(scan.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_threshold() {
        let scan = ScanConfig {
            failure_threshold: 0,
            ..ScanConfig::default()
        };
        assert!(scan.validate().is_err());
    }
}
