//! Parameter perturbation testing.
//!
//! Takes a set of already-optimized parameters and measures how much
//! performance is lost when each parameter is nudged away from its optimum.
//! A strategy whose edge evaporates under a 5% parameter change was most
//! likely fit to noise rather than to a durable market effect.
//!
//! Each perturbed evaluation is independent, so the (parameter, level,
//! direction) fan-out runs in parallel. Aggregation is order-independent:
//! outcomes are keyed by job identity, never by completion order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::MetricKind;
use crate::types::{BacktestRunner, ParameterSet, TimeRange};

/// One perturbation magnitude and the degradation tolerated at it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerturbationLevel {
    /// Relative magnitude, e.g. 0.05 for a ±5% perturbation.
    pub magnitude: f64,
    /// Maximum tolerated degradation at this magnitude.
    pub max_degradation: f64,
}

/// Configuration for perturbation testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbationConfig {
    /// Perturbation levels to test, smallest first.
    pub levels: Vec<PerturbationLevel>,
    /// Metric used as the performance reference.
    pub metric: MetricKind,
    /// Perturbed runs producing fewer trades than this are scored as
    /// negative infinity rather than silently ignored.
    pub min_trades: usize,
    /// Minimum aggregate robustness score for the analysis to pass.
    pub min_robustness_score: f64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            levels: vec![
                PerturbationLevel {
                    magnitude: 0.05,
                    max_degradation: 0.15,
                },
                PerturbationLevel {
                    magnitude: 0.10,
                    max_degradation: 0.25,
                },
                PerturbationLevel {
                    magnitude: 0.20,
                    max_degradation: 0.40,
                },
            ],
            metric: MetricKind::Sharpe,
            min_trades: 10,
            min_robustness_score: 0.5,
        }
    }
}

impl PerturbationConfig {
    /// Set the reference metric.
    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Set the minimum trade count for a perturbed run to score normally.
    pub fn with_min_trades(mut self, min_trades: usize) -> Self {
        self.min_trades = min_trades;
        self
    }
}

/// Outcome of perturbing one parameter at one magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelOutcome {
    pub magnitude: f64,
    /// Metric with the parameter scaled to (1 + magnitude).
    pub metric_up: f64,
    /// Metric with the parameter scaled to (1 - magnitude).
    pub metric_down: f64,
    /// Worse-direction degradation relative to the baseline.
    pub degradation: f64,
    pub passed: bool,
}

/// Sensitivity findings for a single parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterPerturbationResult {
    pub parameter: String,
    pub base_value: f64,
    pub levels: Vec<LevelOutcome>,
    /// Mean degradation across all tested levels.
    pub average_sensitivity: f64,
    /// Fragile if the average exceeds 0.3 or any level failed.
    pub is_fragile: bool,
    /// Recommended for pinning to a default when the average exceeds 0.5.
    pub recommend_fix_to_default: bool,
}

/// Aggregate perturbation analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbationAnalysis {
    pub metric: MetricKind,
    pub baseline_metric: f64,
    pub parameters: Vec<ParameterPerturbationResult>,
    /// Zero-valued parameters that cannot be scaled multiplicatively.
    pub skipped: Vec<String>,
    /// `max(0, 1 - mean(per-parameter average sensitivity))`.
    pub robustness_score: f64,
    /// Parameter names ordered by descending average sensitivity.
    pub fragility_ranking: Vec<String>,
    pub passed: bool,
}

impl PerturbationAnalysis {
    /// Plain-text summary including the fragility ranking.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Parameter Perturbation Summary:\n\
             Metric: {}\n\
             Baseline: {:.4}\n\
             Robustness Score: {:.2}\n\
             Parameters tested: {} (skipped: {})\n\
             Result: {}\n",
            self.metric.display_name(),
            self.baseline_metric,
            self.robustness_score,
            self.parameters.len(),
            self.skipped.len(),
            if self.passed { "PASSED" } else { "FAILED" }
        );
        if !self.fragility_ranking.is_empty() {
            out.push_str("Fragility ranking (most sensitive first):\n");
            for name in &self.fragility_ranking {
                if let Some(p) = self.parameters.iter().find(|p| &p.parameter == name) {
                    out.push_str(&format!(
                        "  {} (sensitivity {:.2}{})\n",
                        name,
                        p.average_sensitivity,
                        if p.is_fragile { ", FRAGILE" } else { "" }
                    ));
                }
            }
        }
        out
    }

    /// Number of fragile parameters.
    pub fn fragile_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_fragile).count()
    }
}

impl fmt::Display for PerturbationAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// One perturbed backtest to execute: parameter, magnitude index, direction.
#[derive(Debug, Clone)]
struct Job {
    parameter: String,
    base_value: f64,
    level_idx: usize,
    direction: f64,
}

/// Parameter perturbation tester.
pub struct PerturbationTester {
    config: PerturbationConfig,
}

impl PerturbationTester {
    /// Create a new perturbation tester.
    pub fn new(config: PerturbationConfig) -> Self {
        Self { config }
    }

    /// Run the perturbation analysis: one baseline backtest, then two
    /// backtests per (non-zero parameter, level) with the single parameter
    /// scaled to (1 ± magnitude), all others held fixed.
    ///
    /// Collaborator failures abort the analysis and propagate unchanged.
    pub fn run(
        &self,
        params: &ParameterSet,
        runner: &dyn BacktestRunner,
        range: &TimeRange,
    ) -> Result<PerturbationAnalysis> {
        let baseline = runner.run(params, range)?;
        let baseline_metric = self.config.metric.extract(&baseline.metrics);
        info!(baseline_metric, "perturbation baseline complete");

        let mut skipped = Vec::new();
        let mut jobs = Vec::new();
        for (name, &value) in params.iter() {
            if value == 0.0 {
                // Zero cannot be scaled multiplicatively.
                warn!(parameter = %name, "skipping zero-valued parameter");
                skipped.push(name.clone());
                continue;
            }
            for (level_idx, _) in self.config.levels.iter().enumerate() {
                for direction in [1.0, -1.0] {
                    jobs.push(Job {
                        parameter: name.clone(),
                        base_value: value,
                        level_idx,
                        direction,
                    });
                }
            }
        }

        let outcomes: Vec<(Job, f64)> = jobs
            .into_par_iter()
            .map(|job| {
                let magnitude = self.config.levels[job.level_idx].magnitude;
                let mut perturbed = params.clone();
                perturbed.insert(
                    job.parameter.clone(),
                    job.base_value * (1.0 + job.direction * magnitude),
                );
                let result = runner.run(&perturbed, range)?;
                let metric = if result.metrics.total_trades < self.config.min_trades {
                    // Too few trades to trust: maximal penalty.
                    f64::NEG_INFINITY
                } else {
                    self.config.metric.extract(&result.metrics)
                };
                Ok((job, metric))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut parameters = Vec::new();
        for (name, &value) in params.iter() {
            if value == 0.0 {
                continue;
            }

            let mut levels = Vec::with_capacity(self.config.levels.len());
            for (level_idx, level) in self.config.levels.iter().enumerate() {
                let find = |direction: f64| {
                    outcomes
                        .iter()
                        .find(|(job, _)| {
                            job.parameter == *name
                                && job.level_idx == level_idx
                                && job.direction == direction
                        })
                        .map(|(_, metric)| *metric)
                        .unwrap_or(f64::NEG_INFINITY)
                };
                let metric_up = find(1.0);
                let metric_down = find(-1.0);

                let degradation = if baseline_metric <= 0.0 {
                    0.0
                } else {
                    let worst = metric_up.min(metric_down);
                    ((baseline_metric - worst) / baseline_metric).max(0.0)
                };

                levels.push(LevelOutcome {
                    magnitude: level.magnitude,
                    metric_up,
                    metric_down,
                    degradation,
                    passed: degradation <= level.max_degradation,
                });
            }

            let average_sensitivity = if levels.is_empty() {
                0.0
            } else {
                levels.iter().map(|l| l.degradation).sum::<f64>() / levels.len() as f64
            };
            let any_level_failed = levels.iter().any(|l| !l.passed);

            parameters.push(ParameterPerturbationResult {
                parameter: name.clone(),
                base_value: value,
                levels,
                average_sensitivity,
                is_fragile: average_sensitivity > 0.3 || any_level_failed,
                recommend_fix_to_default: average_sensitivity > 0.5,
            });
        }

        let robustness_score = if parameters.is_empty() {
            warn!("no perturbable parameters; robustness is vacuous");
            1.0
        } else {
            let mean_sensitivity = parameters
                .iter()
                .map(|p| p.average_sensitivity)
                .sum::<f64>()
                / parameters.len() as f64;
            (1.0 - mean_sensitivity).max(0.0)
        };

        let mut fragility_ranking: Vec<(String, f64)> = parameters
            .iter()
            .map(|p| (p.parameter.clone(), p.average_sensitivity))
            .collect();
        fragility_ranking.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        });
        let fragility_ranking: Vec<String> =
            fragility_ranking.into_iter().map(|(name, _)| name).collect();

        let fragile_count = parameters.iter().filter(|p| p.is_fragile).count();
        let passed = robustness_score >= self.config.min_robustness_score
            && fragile_count * 2 <= parameters.len();

        info!(
            robustness_score,
            fragile_count, passed, "perturbation analysis complete"
        );

        Ok(PerturbationAnalysis {
            metric: self.config.metric,
            baseline_metric,
            parameters,
            skipped,
            robustness_score,
            fragility_ranking,
            passed,
        })
    }
}
