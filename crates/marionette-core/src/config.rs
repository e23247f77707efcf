//! Solver and update-loop settings, loadable from TOML.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_max_iterations() -> u32 {
    16
}
const fn default_tolerance_sq() -> f32 {
    1e-4
}
const fn default_singularity_nudge_deg() -> f32 {
    1.0
}
const fn default_max_update_passes() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// IkSettings
// ---------------------------------------------------------------------------

/// Tunables for the solvers and the per-frame update loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkSettings {
    /// CCD pass cap per solve (default: 16).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Squared tip-to-target distance below which CCD exits early
    /// (default: 1e-4).
    #[serde(default = "default_tolerance_sq")]
    pub tolerance_sq: f32,

    /// Degrees applied to the chain root to break a perfectly straight
    /// configuration before iterating (default: 1).
    #[serde(default = "default_singularity_nudge_deg")]
    pub singularity_nudge_deg: f32,

    /// Update passes per frame when Parent-space targets need a settled
    /// scene pose. Hard-capped at 2: the loop is a bounded fixed-point
    /// iteration for one ordering dependency, not a dependency-graph
    /// solver, and deeper chains of Parent-space targets are out of
    /// contract.
    #[serde(default = "default_max_update_passes")]
    pub max_update_passes: u32,
}

impl Default for IkSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance_sq: default_tolerance_sq(),
            singularity_nudge_deg: default_singularity_nudge_deg(),
            max_update_passes: default_max_update_passes(),
        }
    }
}

impl IkSettings {
    /// Validate settings. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidIterations(self.max_iterations));
        }
        if !(self.tolerance_sq > 0.0) {
            return Err(ConfigError::InvalidTolerance(self.tolerance_sq));
        }
        if self.max_update_passes == 0 || self.max_update_passes > 2 {
            return Err(ConfigError::InvalidPassCap(self.max_update_passes));
        }
        Ok(())
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
