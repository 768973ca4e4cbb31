use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Layout of the two-factor variance analysis: factor A levels are channels,
/// factor B levels are contiguous blocks of `replications` rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorDesign {
    pub a_levels: usize,
    pub b_levels: usize,
    pub replications: usize,
}

impl Default for TwoFactorDesign {
    fn default() -> Self {
        Self {
            a_levels: 12,
            b_levels: 5,
            replications: 1000,
        }
    }
}

impl TwoFactorDesign {
    pub fn new(a_levels: usize, b_levels: usize, replications: usize) -> Self {
        Self {
            a_levels,
            b_levels,
            replications,
        }
    }

    /// Derive a design that splits `rows` into `b_levels` equal blocks.
    pub fn for_shape(channels: usize, rows: usize, b_levels: usize) -> Self {
        let replications = if b_levels == 0 { 0 } else { rows / b_levels };
        Self::new(channels, b_levels, replications)
    }

    pub fn observations(&self) -> usize {
        self.a_levels * self.b_levels * self.replications
    }

    /// Check the design against a matrix of `rows` × `channels`.
    pub fn validate(&self, rows: usize, channels: usize) -> Result<(), AnalysisError> {
        if self.a_levels < 2 || self.b_levels < 2 {
            return Err(AnalysisError::configuration(format!(
                "two-factor design needs at least 2 levels per factor (A={}, B={})",
                self.a_levels, self.b_levels
            )));
        }
        if self.replications == 0 {
            return Err(AnalysisError::configuration(
                "two-factor design needs at least one replication per cell",
            ));
        }
        if self.a_levels != channels {
            return Err(AnalysisError::configuration(format!(
                "factor A has {} levels but the matrix has {} channels",
                self.a_levels, channels
            )));
        }
        if self.observations() != rows * channels {
            return Err(AnalysisError::configuration(format!(
                "design {}x{}x{} covers {} observations, matrix holds {}",
                self.a_levels,
                self.b_levels,
                self.replications,
                self.observations(),
                rows * channels
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 100,
            tolerance: 1e-4,
            seed: None,
        }
    }
}

impl ClusterConfig {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self, points: usize) -> Result<(), AnalysisError> {
        if self.k == 0 {
            return Err(AnalysisError::configuration(
                "cluster count must be greater than zero",
            ));
        }
        if self.k > points {
            return Err(AnalysisError::configuration(format!(
                "requested {} clusters but only {} points are available",
                self.k, points
            )));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::configuration(
                "k-means needs at least one iteration",
            ));
        }
        if !(self.tolerance >= 0.0) {
            return Err(AnalysisError::configuration(
                "k-means tolerance must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Settings shared by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub channels: usize,
    pub correlation_threshold: f64,
    pub validation_tolerance: f64,
    /// `None` derives a design with `b_levels` blocks from the input shape.
    pub two_factor: Option<TwoFactorDesign>,
    pub b_levels: usize,
    pub clustering: ClusterConfig,
    pub cluster_counts: Vec<usize>,
    pub principal_series: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            channels: 12,
            correlation_threshold: 0.9,
            validation_tolerance: 1e-6,
            two_factor: None,
            b_levels: 5,
            clustering: ClusterConfig::default(),
            cluster_counts: vec![11, 7],
            principal_series: 3,
        }
    }
}

impl AnalysisConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open config file {:?}", path))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("deserialize config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.channels == 0 {
            return Err(AnalysisError::configuration(
                "channel count must be greater than zero",
            ));
        }
        if !(self.correlation_threshold > 0.0 && self.correlation_threshold <= 1.0) {
            return Err(AnalysisError::configuration(format!(
                "correlation threshold {} must lie in (0, 1]",
                self.correlation_threshold
            )));
        }
        if !(self.validation_tolerance > 0.0) {
            return Err(AnalysisError::configuration(
                "validation tolerance must be positive",
            ));
        }
        if self.cluster_counts.is_empty() {
            return Err(AnalysisError::configuration(
                "at least one cluster count is required",
            ));
        }
        Ok(())
    }

    /// Two-factor design for a matrix of the given shape.
    pub fn design_for(&self, rows: usize, channels: usize) -> TwoFactorDesign {
        self.two_factor
            .unwrap_or_else(|| TwoFactorDesign::for_shape(channels, rows, self.b_levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_design_matches_twelve_lead_layout() {
        let design = TwoFactorDesign::default();
        assert_eq!(design.observations(), 12 * 5 * 1000);
        assert!(design.validate(5000, 12).is_ok());
        assert!(design.validate(4999, 12).is_err());
        assert!(design.validate(5000, 11).is_err());
    }

    #[test]
    fn degenerate_designs_are_rejected() {
        assert!(TwoFactorDesign::new(1, 5, 10).validate(50, 1).is_err());
        assert!(TwoFactorDesign::new(3, 1, 10).validate(10, 3).is_err());
        assert!(TwoFactorDesign::new(3, 2, 0).validate(0, 3).is_err());
    }

    #[test]
    fn derived_design_uses_configured_blocks() {
        let config = AnalysisConfig::default();
        let design = config.design_for(100, 4);
        assert_eq!(design, TwoFactorDesign::new(4, 5, 20));
    }

    #[test]
    fn cluster_count_bounds() {
        let config = ClusterConfig::default().with_k(0);
        assert!(config.validate(10).is_err());
        let config = ClusterConfig::default().with_k(11);
        assert!(config.validate(10).is_err());
        assert!(ClusterConfig::default().with_k(10).validate(10).is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"channels": 3, "clustering": {"k": 2, "seed": 7}}"#)
                .expect("config");
        assert_eq!(config.channels, 3);
        assert_eq!(config.clustering.k, 2);
        assert_eq!(config.clustering.seed, Some(7));
        assert_eq!(config.clustering.max_iterations, 100);
        assert_eq!(config.correlation_threshold, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let mut config = AnalysisConfig::default();
        config.correlation_threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
