//! Configuration file support for validation runs.
//!
//! Allows loading the full validation pipeline configuration from TOML files
//! for reproducibility. Every field carries a default identical to the
//! corresponding analyzer's `Default`, so an empty file yields the same
//! pipeline as constructing the configs in code.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Result, ValidationError};
use crate::holdout::HoldoutConfig;
use crate::importance::ImportanceConfig;
use crate::metrics::MetricKind;
use crate::overfit::OverfitConfig;
use crate::perturbation::{PerturbationConfig, PerturbationLevel};
use crate::report::ReportConfig;

/// Complete validation configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationFileConfig {
    /// Holdout validation settings.
    #[serde(default)]
    pub holdout: HoldoutSettings,
    /// Parameter perturbation settings.
    #[serde(default)]
    pub perturbation: PerturbationSettings,
    /// Feature importance settings.
    #[serde(default)]
    pub importance: ImportanceSettings,
    /// Overfit detection settings.
    #[serde(default)]
    pub overfit: OverfitSettings,
    /// Report generation settings.
    #[serde(default)]
    pub report: ReportSettings,
}

impl ValidationFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.as_ref().display(), "loaded validation config");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Holdout validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldoutSettings {
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    #[serde(default = "default_min_holdout_days")]
    pub min_holdout_days: f64,
    #[serde(default = "default_min_holdout_trades")]
    pub min_holdout_trades: usize,
    #[serde(default)]
    pub min_holdout_sharpe: f64,
    #[serde(default = "default_max_avg_degradation")]
    pub max_avg_degradation: f64,
}

fn default_holdout_fraction() -> f64 {
    0.2
}
fn default_min_holdout_days() -> f64 {
    30.0
}
fn default_min_holdout_trades() -> usize {
    10
}
fn default_max_avg_degradation() -> f64 {
    0.5
}

impl Default for HoldoutSettings {
    fn default() -> Self {
        Self {
            holdout_fraction: default_holdout_fraction(),
            min_holdout_days: default_min_holdout_days(),
            min_holdout_trades: default_min_holdout_trades(),
            min_holdout_sharpe: 0.0,
            max_avg_degradation: default_max_avg_degradation(),
        }
    }
}

impl HoldoutSettings {
    /// Materialize the analyzer config.
    pub fn to_config(&self) -> HoldoutConfig {
        HoldoutConfig {
            holdout_fraction: self.holdout_fraction,
            min_holdout_days: self.min_holdout_days,
            min_holdout_trades: self.min_holdout_trades,
            min_holdout_sharpe: self.min_holdout_sharpe,
            max_avg_degradation: self.max_avg_degradation,
        }
    }
}

/// Parameter perturbation settings. Magnitudes and their tolerated
/// degradations are parallel arrays zipped into levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbationSettings {
    #[serde(default = "default_perturbation_magnitudes")]
    pub magnitudes: Vec<f64>,
    #[serde(default = "default_perturbation_max_degradations")]
    pub max_degradations: Vec<f64>,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_perturbation_min_trades")]
    pub min_trades: usize,
    #[serde(default = "default_min_robustness_score")]
    pub min_robustness_score: f64,
}

fn default_perturbation_magnitudes() -> Vec<f64> {
    vec![0.05, 0.10, 0.20]
}
fn default_perturbation_max_degradations() -> Vec<f64> {
    vec![0.15, 0.25, 0.40]
}
fn default_metric() -> String {
    "sharpe".to_string()
}
fn default_perturbation_min_trades() -> usize {
    10
}
fn default_min_robustness_score() -> f64 {
    0.5
}

impl Default for PerturbationSettings {
    fn default() -> Self {
        Self {
            magnitudes: default_perturbation_magnitudes(),
            max_degradations: default_perturbation_max_degradations(),
            metric: default_metric(),
            min_trades: default_perturbation_min_trades(),
            min_robustness_score: default_min_robustness_score(),
        }
    }
}

impl PerturbationSettings {
    /// Materialize the analyzer config. Fails if the magnitude and
    /// degradation arrays have different lengths.
    pub fn to_config(&self) -> Result<PerturbationConfig> {
        if self.magnitudes.len() != self.max_degradations.len() {
            return Err(ValidationError::ConfigError(format!(
                "perturbation magnitudes ({}) and max_degradations ({}) must have equal length",
                self.magnitudes.len(),
                self.max_degradations.len()
            )));
        }
        let levels = self
            .magnitudes
            .iter()
            .zip(self.max_degradations.iter())
            .map(|(&magnitude, &max_degradation)| PerturbationLevel {
                magnitude,
                max_degradation,
            })
            .collect();
        Ok(PerturbationConfig {
            levels,
            metric: MetricKind::from_key(&self.metric),
            min_trades: self.min_trades,
            min_robustness_score: self.min_robustness_score,
        })
    }
}

/// Feature importance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceSettings {
    #[serde(default = "default_num_permutations")]
    pub num_permutations: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_importance_min_trades")]
    pub min_trades: usize,
    #[serde(default = "default_min_importance_threshold")]
    pub min_importance_threshold: f64,
    #[serde(default = "default_max_p_value")]
    pub max_p_value: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_permutations() -> usize {
    100
}
fn default_importance_min_trades() -> usize {
    20
}
fn default_min_importance_threshold() -> f64 {
    0.05
}
fn default_max_p_value() -> f64 {
    0.1
}

impl Default for ImportanceSettings {
    fn default() -> Self {
        Self {
            num_permutations: default_num_permutations(),
            metric: default_metric(),
            min_trades: default_importance_min_trades(),
            min_importance_threshold: default_min_importance_threshold(),
            max_p_value: default_max_p_value(),
            seed: None,
        }
    }
}

impl ImportanceSettings {
    /// Materialize the analyzer config. Unknown metric keys fall back to
    /// total return.
    pub fn to_config(&self) -> ImportanceConfig {
        ImportanceConfig {
            num_permutations: self.num_permutations,
            metric: MetricKind::from_key(&self.metric),
            min_trades: self.min_trades,
            min_importance_threshold: self.min_importance_threshold,
            max_p_value: self.max_p_value,
            seed: self.seed,
        }
    }
}

/// Overfit detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverfitSettings {
    #[serde(default = "default_max_sharpe_degradation")]
    pub max_sharpe_degradation: f64,
    #[serde(default = "default_max_return_degradation")]
    pub max_return_degradation: f64,
    #[serde(default = "default_min_stability_score")]
    pub min_stability_score: f64,
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
    #[serde(default = "default_max_params_per_trade")]
    pub max_params_per_trade: f64,
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
}

fn default_max_sharpe_degradation() -> f64 {
    0.3
}
fn default_max_return_degradation() -> f64 {
    0.4
}
fn default_min_stability_score() -> f64 {
    0.5
}
fn default_min_sample_size() -> usize {
    100
}
fn default_max_params_per_trade() -> f64 {
    0.1
}
fn default_significance_level() -> f64 {
    0.05
}

impl Default for OverfitSettings {
    fn default() -> Self {
        Self {
            max_sharpe_degradation: default_max_sharpe_degradation(),
            max_return_degradation: default_max_return_degradation(),
            min_stability_score: default_min_stability_score(),
            min_sample_size: default_min_sample_size(),
            max_params_per_trade: default_max_params_per_trade(),
            significance_level: default_significance_level(),
        }
    }
}

impl OverfitSettings {
    /// Materialize the analyzer config.
    pub fn to_config(&self) -> OverfitConfig {
        OverfitConfig {
            max_sharpe_degradation: self.max_sharpe_degradation,
            max_return_degradation: self.max_return_degradation,
            min_stability_score: self.min_stability_score,
            min_sample_size: self.min_sample_size,
            max_params_per_trade: self.max_params_per_trade,
            significance_level: self.significance_level,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_weight_backtest")]
    pub weight_backtest: f64,
    #[serde(default = "default_weight_walk_forward")]
    pub weight_walk_forward: f64,
    #[serde(default = "default_weight_monte_carlo")]
    pub weight_monte_carlo: f64,
    #[serde(default = "default_weight_overfit")]
    pub weight_overfit: f64,
    #[serde(default = "default_weight_calibration")]
    pub weight_calibration: f64,
    #[serde(default = "default_min_overall_score")]
    pub min_overall_score: f64,
    #[serde(default = "default_go_score")]
    pub go_score: f64,
    #[serde(default = "default_conditional_score")]
    pub conditional_score: f64,
    #[serde(default = "default_max_probability_of_ruin")]
    pub max_probability_of_ruin: f64,
    #[serde(default = "default_min_wf_consistency")]
    pub min_wf_consistency: f64,
    #[serde(default = "default_min_wf_oos_sharpe")]
    pub min_wf_oos_sharpe: f64,
    #[serde(default = "default_max_wf_degradation")]
    pub max_wf_degradation: f64,
    #[serde(default = "default_critical_wf_consistency")]
    pub critical_wf_consistency: f64,
    #[serde(default = "default_max_calibration_error")]
    pub max_calibration_error: f64,
}

fn default_weight_backtest() -> f64 {
    0.2
}
fn default_weight_walk_forward() -> f64 {
    0.3
}
fn default_weight_monte_carlo() -> f64 {
    0.2
}
fn default_weight_overfit() -> f64 {
    0.2
}
fn default_weight_calibration() -> f64 {
    0.1
}
fn default_min_overall_score() -> f64 {
    0.6
}
fn default_go_score() -> f64 {
    0.8
}
fn default_conditional_score() -> f64 {
    0.5
}
fn default_max_probability_of_ruin() -> f64 {
    0.05
}
fn default_min_wf_consistency() -> f64 {
    0.5
}
fn default_min_wf_oos_sharpe() -> f64 {
    0.5
}
fn default_max_wf_degradation() -> f64 {
    0.5
}
fn default_critical_wf_consistency() -> f64 {
    0.4
}
fn default_max_calibration_error() -> f64 {
    0.1
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            weight_backtest: default_weight_backtest(),
            weight_walk_forward: default_weight_walk_forward(),
            weight_monte_carlo: default_weight_monte_carlo(),
            weight_overfit: default_weight_overfit(),
            weight_calibration: default_weight_calibration(),
            min_overall_score: default_min_overall_score(),
            go_score: default_go_score(),
            conditional_score: default_conditional_score(),
            max_probability_of_ruin: default_max_probability_of_ruin(),
            min_wf_consistency: default_min_wf_consistency(),
            min_wf_oos_sharpe: default_min_wf_oos_sharpe(),
            max_wf_degradation: default_max_wf_degradation(),
            critical_wf_consistency: default_critical_wf_consistency(),
            max_calibration_error: default_max_calibration_error(),
        }
    }
}

impl ReportSettings {
    /// Materialize the report config.
    pub fn to_config(&self) -> ReportConfig {
        ReportConfig {
            weight_backtest: self.weight_backtest,
            weight_walk_forward: self.weight_walk_forward,
            weight_monte_carlo: self.weight_monte_carlo,
            weight_overfit: self.weight_overfit,
            weight_calibration: self.weight_calibration,
            min_overall_score: self.min_overall_score,
            go_score: self.go_score,
            conditional_score: self.conditional_score,
            max_probability_of_ruin: self.max_probability_of_ruin,
            min_wf_consistency: self.min_wf_consistency,
            min_wf_oos_sharpe: self.min_wf_oos_sharpe,
            max_wf_degradation: self.max_wf_degradation,
            critical_wf_consistency: self.critical_wf_consistency,
            max_calibration_error: self.max_calibration_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_equals_defaults() {
        let config = ValidationFileConfig::from_toml_str("").unwrap();

        let holdout = config.holdout.to_config();
        assert!((holdout.holdout_fraction - 0.2).abs() < 1e-10);
        assert!((holdout.min_holdout_days - 30.0).abs() < 1e-10);
        assert_eq!(holdout.min_holdout_trades, 10);

        let perturbation = config.perturbation.to_config().unwrap();
        assert_eq!(perturbation.levels.len(), 3);
        assert!((perturbation.levels[0].magnitude - 0.05).abs() < 1e-10);
        assert!((perturbation.levels[2].max_degradation - 0.40).abs() < 1e-10);
        assert_eq!(perturbation.metric, MetricKind::Sharpe);

        let importance = config.importance.to_config();
        assert_eq!(importance.num_permutations, 100);
        assert_eq!(importance.seed, None);

        let overfit = config.overfit.to_config();
        assert_eq!(overfit.min_sample_size, 100);
        assert!((overfit.significance_level - 0.05).abs() < 1e-10);

        let report = config.report.to_config();
        assert!((report.weight_walk_forward - 0.3).abs() < 1e-10);
        assert!((report.go_score - 0.8).abs() < 1e-10);
    }

    #[test]
    fn test_partial_override() {
        let toml = r#"
            [holdout]
            holdout_fraction = 0.3

            [importance]
            num_permutations = 500
            seed = 42
        "#;
        let config = ValidationFileConfig::from_toml_str(toml).unwrap();

        assert!((config.holdout.holdout_fraction - 0.3).abs() < 1e-10);
        // Untouched fields keep their defaults.
        assert!((config.holdout.min_holdout_days - 30.0).abs() < 1e-10);
        assert_eq!(config.importance.num_permutations, 500);
        assert_eq!(config.importance.seed, Some(42));
        assert_eq!(config.perturbation.min_trades, 10);
    }

    #[test]
    fn test_unknown_metric_falls_back_to_total_return() {
        let toml = r#"
            [importance]
            metric = "calmar"
        "#;
        let config = ValidationFileConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.importance.to_config().metric, MetricKind::TotalReturn);
    }

    #[test]
    fn test_mismatched_perturbation_arrays_fail() {
        let toml = r#"
            [perturbation]
            magnitudes = [0.05, 0.10]
            max_degradations = [0.15]
        "#;
        let config = ValidationFileConfig::from_toml_str(toml).unwrap();
        assert!(matches!(
            config.perturbation.to_config(),
            Err(ValidationError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_toml_fails() {
        let result = ValidationFileConfig::from_toml_str("holdout = not valid");
        assert!(matches!(result, Err(ValidationError::TomlError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("crucible_config_test.toml");
        std::fs::write(
            &path,
            "[overfit]\nmin_sample_size = 250\n",
        )
        .unwrap();

        let config = ValidationFileConfig::load(&path).unwrap();
        assert_eq!(config.overfit.min_sample_size, 250);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_fails() {
        let result = ValidationFileConfig::load("/nonexistent/crucible.toml");
        assert!(matches!(result, Err(ValidationError::IoError(_))));
    }
}
