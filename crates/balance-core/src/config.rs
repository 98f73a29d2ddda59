use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_control_freq() -> f64 {
    100.0
}
const fn default_frames() -> usize {
    1000
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Simulation timing configuration.
///
/// Passed explicitly to every plant constructor; the plant derives its
/// fixed sampling period from it and never changes it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Control loop frequency in Hz (default: 100, the microcontroller rate).
    #[serde(default = "default_control_freq")]
    pub control_freq: f64,

    /// Number of frames a simulation run records (default: 1000).
    #[serde(default = "default_frames")]
    pub frames: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            control_freq: default_control_freq(),
            frames: default_frames(),
        }
    }
}

impl SimConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.control_freq > 0.0 && self.control_freq.is_finite()) {
            return Err(ConfigError::InvalidControlFreq(self.control_freq));
        }
        if self.frames == 0 {
            return Err(ConfigError::InvalidFrames(self.frames));
        }
        Ok(())
    }

    /// Sampling period in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.control_freq
    }

    /// Simulated duration of a full run in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn sim_time(&self) -> f64 {
        self.frames as f64 * self.dt()
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
