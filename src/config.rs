//! Configuration loading for the pipeline.
//!
//! All keys are optional with the documented defaults; `load` reads a
//! TOML file and validates the result. Validation failures that would
//! leave the pipeline without a usable sensor setup are fatal.

use serde::Deserialize;
use std::path::Path;

use crate::core::types::Transform;
use crate::error::{Result, TandemError};

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub keyframe: KeyframeConfig,
    #[serde(default, rename = "loop")]
    pub loop_closure: LoopConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Sensor enablement and mounting.
#[derive(Clone, Debug, Deserialize)]
pub struct SensorConfig {
    /// Enable the spinning-scanner branch (default: true)
    #[serde(default = "default_true")]
    pub use_spin: bool,

    /// Enable the solid-state-scanner branch (default: true)
    #[serde(default = "default_true")]
    pub use_solid: bool,

    /// Rigid transform mapping the solid-state frame into the
    /// spinning-scanner frame, as `(x, y, z, roll, pitch, yaw)`
    /// (default: zeros)
    #[serde(default = "default_extrinsic")]
    pub extrinsic: Vec<f32>,
}

/// Registration solver tuning.
#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationConfig {
    /// Eigenvalue cutoff below which the solve counts as degenerate
    /// (default: 10.0)
    #[serde(default = "default_degeneracy_threshold")]
    pub degeneracy_threshold: f32,
}

/// Per-axis keyframe promotion thresholds.
///
/// A registered frame becomes a keyframe when any component of its
/// incremental pose reaches its threshold.
#[derive(Clone, Debug, Deserialize)]
pub struct KeyframeConfig {
    /// Translation threshold along x in meters (default: 0.5)
    #[serde(default = "default_keyframe_xy")]
    pub x: f64,
    /// Translation threshold along y in meters (default: 0.5)
    #[serde(default = "default_keyframe_xy")]
    pub y: f64,
    /// Translation threshold along z in meters (default: 0.1)
    #[serde(default = "default_keyframe_z")]
    pub z: f64,
    /// Rotation threshold about x in radians (default: 0.02)
    #[serde(default = "default_keyframe_angle")]
    pub roll: f64,
    /// Rotation threshold about y in radians (default: 0.02)
    #[serde(default = "default_keyframe_angle")]
    pub pitch: f64,
    /// Rotation threshold about z in radians (default: 0.02)
    #[serde(default = "default_keyframe_angle")]
    pub yaw: f64,
}

/// Loop-closure settings, forwarded verbatim to the loop module.
#[derive(Clone, Debug, Deserialize)]
pub struct LoopConfig {
    /// Run the loop adapter at all (default: true)
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Rejection threshold for candidate matches (default: 0.05)
    #[serde(default = "default_loop_max_loss")]
    pub max_loss: f64,

    /// Cool-down between detections, in keyframes (default: 5)
    #[serde(default = "default_loop_reset")]
    pub reset: u32,

    /// Keyframes to accumulate before the first detection attempt
    /// (default: 100)
    #[serde(default = "default_loop_initial_load")]
    pub initial_load: u32,
}

/// Egress persistence.
#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    /// Directory for the shutdown trajectory dump; empty disables it
    /// (default: "")
    #[serde(default)]
    pub mapping_save_path: String,
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the startup invariants.
    ///
    /// Both sensors disabled or a malformed extrinsic abort startup;
    /// a suspiciously small degeneracy threshold only warns.
    pub fn validate(&self) -> Result<()> {
        if !self.sensors.use_spin && !self.sensors.use_solid {
            return Err(TandemError::Config(
                "use_spin and use_solid cannot both be false".into(),
            ));
        }
        self.sensors.extrinsic_transform()?;
        if self.registration.degeneracy_threshold < 5.0 {
            log::warn!(
                "degeneracy_threshold {} is unusually small",
                self.registration.degeneracy_threshold
            );
        }
        Ok(())
    }
}

impl SensorConfig {
    /// The solid-to-spin extrinsic as a [`Transform`].
    pub fn extrinsic_transform(&self) -> Result<Transform> {
        Transform::from_slice(&self.extrinsic).ok_or_else(|| {
            TandemError::Config(format!(
                "extrinsic must have 6 elements, got {}",
                self.extrinsic.len()
            ))
        })
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            use_spin: true,
            use_solid: true,
            extrinsic: default_extrinsic(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            degeneracy_threshold: default_degeneracy_threshold(),
        }
    }
}

impl Default for KeyframeConfig {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            z: 0.1,
            roll: 0.02,
            pitch: 0.02,
            yaw: 0.02,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_loss: 0.05,
            reset: 5,
            initial_load: 100,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mapping_save_path: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_extrinsic() -> Vec<f32> {
    vec![0.0; 6]
}

fn default_degeneracy_threshold() -> f32 {
    10.0
}

fn default_keyframe_xy() -> f64 {
    0.5
}

fn default_keyframe_z() -> f64 {
    0.1
}

fn default_keyframe_angle() -> f64 {
    0.02
}

fn default_loop_max_loss() -> f64 {
    0.05
}

fn default_loop_reset() -> u32 {
    5
}

fn default_loop_initial_load() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.sensors.use_spin);
        assert!(config.sensors.use_solid);
        assert_eq!(config.sensors.extrinsic, vec![0.0; 6]);
        assert_relative_eq!(config.registration.degeneracy_threshold, 10.0);
        assert_relative_eq!(config.keyframe.x, 0.5);
        assert_relative_eq!(config.keyframe.z, 0.1);
        assert_relative_eq!(config.keyframe.yaw, 0.02);
        assert!(config.loop_closure.enable);
        assert_relative_eq!(config.loop_closure.max_loss, 0.05);
        assert_eq!(config.loop_closure.reset, 5);
        assert_eq!(config.loop_closure.initial_load, 100);
        assert!(config.output.mapping_save_path.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
            [sensors]
            use_solid = false
            extrinsic = [0.1, 0.0, -0.2, 0.0, 0.0, 1.57]

            [loop]
            enable = false

            [output]
            mapping_save_path = "/tmp/traces"
        "#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert!(config.sensors.use_spin);
        assert!(!config.sensors.use_solid);
        assert!(!config.loop_closure.enable);
        assert_eq!(config.loop_closure.reset, 5);
        assert_eq!(config.output.mapping_save_path, "/tmp/traces");
        assert!(config.validate().is_ok());

        let tr = config.sensors.extrinsic_transform().unwrap();
        assert_relative_eq!(tr.x, 0.1, epsilon = 1e-7);
        assert_relative_eq!(tr.yaw, 1.57, epsilon = 1e-5);
    }

    #[test]
    fn test_both_sensors_disabled_is_fatal() {
        let mut config = PipelineConfig::default();
        config.sensors.use_spin = false;
        config.sensors.use_solid = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_extrinsic_length_is_fatal() {
        let mut config = PipelineConfig::default();
        config.sensors.extrinsic = vec![1.0, 2.0, 3.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.toml");
        std::fs::write(&path, "[registration]\ndegeneracy_threshold = 20.0\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_relative_eq!(config.registration.degeneracy_threshold, 20.0);
    }
}
