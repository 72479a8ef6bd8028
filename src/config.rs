//! Configuration loading for Marga

use crate::error::{MargaError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
}

/// Field map source
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GridConfig {
    /// Path to the navgrid JSON file. Absent means the default empty field.
    #[serde(default)]
    pub navgrid_path: Option<PathBuf>,
}

/// Anytime search and worker loop settings
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Inflation factor applied at every reset (default: 2.5)
    #[serde(default = "default_initial_epsilon")]
    pub initial_epsilon: f64,

    /// Inflation decrement per refinement pass (default: 0.5)
    #[serde(default = "default_epsilon_step")]
    pub epsilon_step: f64,

    /// Worker idle sleep in milliseconds (default: 10)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Expansion cap for a single search pass (default: 2,000,000)
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
}

/// Path extraction and corner smoothing settings
#[derive(Clone, Debug, Deserialize)]
pub struct SmoothingConfig {
    /// Anchor placement along each leg toward the corner (default: 0.8)
    #[serde(default = "default_anchor_pct")]
    pub anchor_pct: f64,

    /// Bezier control distance as a fraction of anchor spacing (default: 0.33)
    #[serde(default = "default_control_pct")]
    pub control_pct: f64,

    /// Bezier parameter step for long segments (default: 0.05)
    #[serde(default = "default_sample_resolution")]
    pub sample_resolution: f64,

    /// Bezier parameter step for short segments (default: 0.2)
    #[serde(default = "default_short_segment_resolution")]
    pub short_segment_resolution: f64,

    /// Chord length at or below which a segment counts as short, meters (default: 1.0)
    #[serde(default = "default_short_segment_length")]
    pub short_segment_length: f64,

    /// Greedy extraction step cap (default: 1000)
    #[serde(default = "default_max_extraction_steps")]
    pub max_extraction_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            initial_epsilon: default_initial_epsilon(),
            epsilon_step: default_epsilon_step(),
            poll_interval_ms: default_poll_interval_ms(),
            max_expansions: default_max_expansions(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            anchor_pct: default_anchor_pct(),
            control_pct: default_control_pct(),
            sample_resolution: default_sample_resolution(),
            short_segment_resolution: default_short_segment_resolution(),
            short_segment_length: default_short_segment_length(),
            max_extraction_steps: default_max_extraction_steps(),
        }
    }
}

// Planner defaults
fn default_initial_epsilon() -> f64 {
    2.5
}
fn default_epsilon_step() -> f64 {
    0.5
}
fn default_poll_interval_ms() -> u64 {
    10
}
fn default_max_expansions() -> usize {
    2_000_000
}

// Smoothing defaults
fn default_anchor_pct() -> f64 {
    0.8
}
fn default_control_pct() -> f64 {
    0.33
}
fn default_sample_resolution() -> f64 {
    0.05
}
fn default_short_segment_resolution() -> f64 {
    0.2
}
fn default_short_segment_length() -> f64 {
    1.0
}
fn default_max_extraction_steps() -> usize {
    1000
}

impl PlannerConfig {
    /// Idle sleep as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl MargaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: MargaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the planner cannot run with.
    pub fn validate(&self) -> Result<()> {
        let planner = &self.planner;
        if !(planner.initial_epsilon.is_finite() && planner.initial_epsilon >= 1.0) {
            return Err(MargaError::Config(format!(
                "planner.initial_epsilon must be >= 1.0, got {}",
                planner.initial_epsilon
            )));
        }
        if !(planner.epsilon_step.is_finite() && planner.epsilon_step > 0.0) {
            return Err(MargaError::Config(format!(
                "planner.epsilon_step must be positive, got {}",
                planner.epsilon_step
            )));
        }
        if planner.max_expansions == 0 {
            return Err(MargaError::Config("planner.max_expansions must be non-zero".into()));
        }
        if planner.poll_interval_ms == 0 {
            return Err(MargaError::Config("planner.poll_interval_ms must be non-zero".into()));
        }

        let smoothing = &self.smoothing;
        for (name, value) in [
            ("smoothing.sample_resolution", smoothing.sample_resolution),
            ("smoothing.short_segment_resolution", smoothing.short_segment_resolution),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(MargaError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("smoothing.anchor_pct", smoothing.anchor_pct),
            ("smoothing.control_pct", smoothing.control_pct),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MargaError::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if smoothing.max_extraction_steps == 0 {
            return Err(MargaError::Config(
                "smoothing.max_extraction_steps must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: MargaConfig = toml::from_str("").unwrap();
        assert!((config.planner.initial_epsilon - 2.5).abs() < 1e-12);
        assert!((config.planner.epsilon_step - 0.5).abs() < 1e-12);
        assert_eq!(config.planner.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.smoothing.max_extraction_steps, 1000);
        assert!(config.grid.navgrid_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section() {
        let config: MargaConfig = toml::from_str(
            r#"
            [planner]
            initial_epsilon = 3.0

            [grid]
            navgrid_path = "configs/navgrid.json"
            "#,
        )
        .unwrap();
        assert!((config.planner.initial_epsilon - 3.0).abs() < 1e-12);
        assert!((config.planner.epsilon_step - 0.5).abs() < 1e-12);
        assert_eq!(
            config.grid.navgrid_path.as_deref(),
            Some(Path::new("configs/navgrid.json"))
        );
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[planner]\ninitial_epsilon = 0.5").unwrap();
        assert!(matches!(
            MargaConfig::load(file.path()),
            Err(MargaError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_stalled_schedule() {
        let mut config = MargaConfig::default();
        config.planner.epsilon_step = 0.0;
        assert!(matches!(config.validate(), Err(MargaError::Config(_))));

        let mut config = MargaConfig::default();
        config.planner.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(MargaError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(MargaConfig::load(Path::new("/nonexistent/marga.toml")).is_err());
    }

    #[test]
    fn test_shipped_config_loads() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let config = MargaConfig::load(&root.join("configs/marga.toml")).unwrap();
        assert_eq!(config.planner.max_expansions, 2_000_000);

        let navgrid_path = root.join(config.grid.navgrid_path.unwrap());
        let navgrid = crate::grid::NavGrid::load(&navgrid_path).unwrap();
        assert_eq!(navgrid.geometry().width(), 83);
        assert_eq!(navgrid.geometry().height(), 41);
        assert!(!navgrid.blocked().is_empty());
    }
}
