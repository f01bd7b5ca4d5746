//! Plate configuration: grid dimensions, boundary peak and convergence threshold.
//!
//! Values come from built-in defaults, an optional TOML file, and CLI
//! overrides, in that order. A TOML file may set any subset of fields:
//!
//! ```toml
//! rows = 500
//! columns = 500
//! peak = 100.0
//! max_temp_error = 0.01
//! progress_interval = 0
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ThermoplateError};

/// Interior rows of the reference plate.
pub const DEFAULT_ROWS: usize = 1000;
/// Interior columns of the reference plate.
pub const DEFAULT_COLUMNS: usize = 1000;
/// Temperature reached by the ramped edges at their far end.
pub const DEFAULT_PEAK: f64 = 100.0;
/// Largest permitted per-cell change once converged.
pub const DEFAULT_MAX_TEMP_ERROR: f64 = 0.01;
/// Iterations between diagonal progress logs.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Static run parameters shared by every rank.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlateConfig {
    /// Interior rows (the grid has `rows + 2` rows including both boundaries).
    pub rows: usize,
    /// Interior columns (the grid has `columns + 2` columns).
    pub columns: usize,
    pub peak: f64,
    pub max_temp_error: f64,
    /// Log the bottom-right diagonal every this many iterations; 0 disables.
    pub progress_interval: usize,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            peak: DEFAULT_PEAK,
            max_temp_error: DEFAULT_MAX_TEMP_ERROR,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PlateConfig {
    /// Config with the given interior dimensions and default everything else.
    pub fn with_size(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ThermoplateError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject configurations the averaging update cannot run on.
    ///
    /// NaN and infinities are not detected once the loop is running, so
    /// they have to be caught here.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(ThermoplateError::Config(format!(
                "plate needs at least one interior cell, got {}x{}",
                self.rows, self.columns
            )));
        }
        if !self.peak.is_finite() {
            return Err(ThermoplateError::Config(format!(
                "peak temperature must be finite, got {}",
                self.peak
            )));
        }
        if !self.max_temp_error.is_finite() || self.max_temp_error < 0.0 {
            return Err(ThermoplateError::Config(format!(
                "convergence threshold must be a finite non-negative number, got {}",
                self.max_temp_error
            )));
        }
        Ok(())
    }
}
