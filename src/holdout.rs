//! Holdout (out-of-sample) validation.
//!
//! Splits a time range into a training/validation window and a never-touched
//! holdout window, drives optimization and backtesting on each side, and
//! measures how much of the optimized performance survives on unseen data.
//!
//! The invariant this module exists to enforce: the holdout window is never
//! passed to the parameter optimizer. Optimization sees the training window
//! only; the holdout is evaluated exactly once, with the already-optimized
//! parameters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::{Result, ValidationError};
use crate::metrics::DegradationDetail;
use crate::types::{
    BacktestRunner, ParameterOptimizer, ParameterSet, PerformanceMetrics, TimeRange,
};

/// Configuration for holdout validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldoutConfig {
    /// Fraction of the total range reserved for the holdout window.
    pub holdout_fraction: f64,
    /// Minimum holdout window length in days. Shorter windows are a
    /// configuration error.
    pub min_holdout_days: f64,
    /// Minimum number of holdout trades for the validation to pass.
    pub min_holdout_trades: usize,
    /// Minimum holdout Sharpe ratio for the validation to pass.
    pub min_holdout_sharpe: f64,
    /// Maximum average degradation for the validation to pass.
    pub max_avg_degradation: f64,
}

impl Default for HoldoutConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            min_holdout_days: 30.0,
            min_holdout_trades: 10,
            min_holdout_sharpe: 0.0,
            max_avg_degradation: 0.5,
        }
    }
}

impl HoldoutConfig {
    /// Create a config with a custom holdout fraction.
    pub fn new(holdout_fraction: f64) -> Self {
        Self {
            holdout_fraction,
            ..Default::default()
        }
    }

    /// Set the minimum holdout window length in days.
    pub fn with_min_holdout_days(mut self, days: f64) -> Self {
        self.min_holdout_days = days;
        self
    }

    /// Set the minimum number of holdout trades.
    pub fn with_min_holdout_trades(mut self, trades: usize) -> Self {
        self.min_holdout_trades = trades;
        self
    }
}

/// A time range split into training/validation and holdout windows.
///
/// Invariant: `train_val.end == holdout.start`, and the holdout day count is
/// the configured fraction of the total (fractional days allowed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldoutSplit {
    pub train_val: TimeRange,
    pub holdout: TimeRange,
    pub train_val_days: f64,
    pub holdout_days: f64,
}

/// Qualitative confidence level derived from the confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
    None,
}

impl ConfidenceLevel {
    /// Map a confidence score to its qualitative level.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Moderate
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::None
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Additive confidence assessment of the holdout result.
///
/// Contributions are mutually exclusive within their bucket and the final
/// score is clamped to 1. The reasons list records which contributions fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub reasons: Vec<String>,
}

impl ConfidenceAssessment {
    /// Score a holdout result against its degradation detail.
    pub fn assess(holdout: &PerformanceMetrics, degradation: &DegradationDetail) -> Self {
        let mut score: f64 = 0.0;
        let mut reasons = Vec::new();

        if holdout.total_return_pct > 0.0 {
            score += 0.25;
            reasons.push("holdout return is positive".to_string());
        }

        if holdout.sharpe_ratio > 0.5 {
            score += 0.25;
            reasons.push(format!(
                "holdout Sharpe {:.2} above 0.5",
                holdout.sharpe_ratio
            ));
        } else if holdout.sharpe_ratio > 0.0 {
            score += 0.15;
            reasons.push(format!("holdout Sharpe {:.2} positive", holdout.sharpe_ratio));
        }

        if degradation.average < 0.20 {
            score += 0.25;
            reasons.push(format!(
                "average degradation {:.2} below 0.20",
                degradation.average
            ));
        } else if degradation.average < 0.40 {
            score += 0.10;
            reasons.push(format!(
                "average degradation {:.2} below 0.40",
                degradation.average
            ));
        }

        if holdout.total_trades >= 30 {
            score += 0.15;
            reasons.push(format!("{} holdout trades", holdout.total_trades));
        } else if holdout.total_trades >= 15 {
            score += 0.05;
            reasons.push(format!(
                "{} holdout trades (modest sample)",
                holdout.total_trades
            ));
        }

        if holdout.win_rate > 0.5 {
            score += 0.10;
            reasons.push(format!("holdout win rate {:.0}%", holdout.win_rate * 100.0));
        }

        let score = score.min(1.0);

        Self {
            score,
            level: ConfidenceLevel::from_score(score),
            reasons,
        }
    }
}

/// Complete holdout validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldoutValidation {
    pub split: HoldoutSplit,
    pub optimized_params: ParameterSet,
    pub train_val_metrics: PerformanceMetrics,
    pub holdout_metrics: PerformanceMetrics,
    pub degradation: DegradationDetail,
    pub confidence: ConfidenceAssessment,
    /// Every failed check, accumulated independently.
    pub failure_reasons: Vec<String>,
    pub passed: bool,
}

impl HoldoutValidation {
    /// Plain-text summary of the validation outcome.
    pub fn summary(&self) -> String {
        format!(
            "Holdout Validation Summary:\n\
             Train/Val: {} ({:.1} days)\n\
             Holdout:   {} ({:.1} days)\n\
             Train Sharpe: {:.2}  Holdout Sharpe: {:.2}\n\
             Avg Degradation: {:.1}%\n\
             Confidence: {:.2} ({})\n\
             Result: {}",
            self.split.train_val,
            self.split.train_val_days,
            self.split.holdout,
            self.split.holdout_days,
            self.train_val_metrics.sharpe_ratio,
            self.holdout_metrics.sharpe_ratio,
            self.degradation.average * 100.0,
            self.confidence.score,
            self.confidence.level,
            if self.passed { "PASSED" } else { "FAILED" }
        )
    }
}

/// Holdout validator. Pure with respect to its configuration and inputs.
pub struct HoldoutValidator {
    config: HoldoutConfig,
}

impl HoldoutValidator {
    /// Create a new holdout validator.
    pub fn new(config: HoldoutConfig) -> Self {
        Self { config }
    }

    /// Deterministically split a time range into train/val and holdout
    /// windows. Fails if the implied holdout window is shorter than the
    /// configured minimum.
    pub fn create_split(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<HoldoutSplit> {
        let total = TimeRange::new(start, end);
        if !total.is_valid() {
            return Err(ValidationError::ConfigError(format!(
                "invalid holdout range: start {} is not before end {}",
                start, end
            )));
        }

        let total_ms = end.signed_duration_since(start).num_milliseconds();
        let holdout_ms = (total_ms as f64 * self.config.holdout_fraction).round() as i64;
        let boundary = end - Duration::milliseconds(holdout_ms);

        let train_val = TimeRange::new(start, boundary);
        let holdout = TimeRange::new(boundary, end);
        let holdout_days = holdout.duration_days();

        if holdout_days < self.config.min_holdout_days {
            return Err(ValidationError::ConfigError(format!(
                "holdout window of {:.1} days is shorter than the {:.1}-day minimum",
                holdout_days, self.config.min_holdout_days
            )));
        }

        Ok(HoldoutSplit {
            train_val_days: train_val.duration_days(),
            holdout_days,
            train_val,
            holdout,
        })
    }

    /// Run full holdout validation: optimize on the training window, backtest
    /// both windows with the optimized parameters, and score the degradation.
    ///
    /// The optimizer only ever sees the training window. Collaborator
    /// failures propagate unchanged.
    pub fn validate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        optimizer: &dyn ParameterOptimizer,
        runner: &dyn BacktestRunner,
    ) -> Result<HoldoutValidation> {
        let split = self.create_split(start, end)?;
        info!(
            train_val_days = split.train_val_days,
            holdout_days = split.holdout_days,
            "starting holdout validation"
        );

        let optimized_params = optimizer.optimize(&split.train_val)?;
        let train_result = runner.run(&optimized_params, &split.train_val)?;
        let holdout_result = runner.run(&optimized_params, &split.holdout)?;

        let degradation =
            DegradationDetail::between(&train_result.metrics, &holdout_result.metrics);
        let confidence = ConfidenceAssessment::assess(&holdout_result.metrics, &degradation);

        let mut failure_reasons = Vec::new();
        if holdout_result.metrics.total_trades < self.config.min_holdout_trades {
            failure_reasons.push(format!(
                "insufficient holdout trades: {} < {}",
                holdout_result.metrics.total_trades, self.config.min_holdout_trades
            ));
        }
        if holdout_result.metrics.sharpe_ratio < self.config.min_holdout_sharpe {
            failure_reasons.push(format!(
                "holdout Sharpe {:.2} below minimum {:.2}",
                holdout_result.metrics.sharpe_ratio, self.config.min_holdout_sharpe
            ));
        }
        if degradation.average > self.config.max_avg_degradation {
            failure_reasons.push(format!(
                "average degradation {:.2} above maximum {:.2}",
                degradation.average, self.config.max_avg_degradation
            ));
        }
        if holdout_result.metrics.total_return_pct < 0.0 {
            failure_reasons.push(format!(
                "negative holdout return: {:.2}%",
                holdout_result.metrics.total_return_pct
            ));
        }

        let passed = failure_reasons.is_empty();
        info!(passed, confidence = confidence.score, "holdout validation complete");

        Ok(HoldoutValidation {
            split,
            optimized_params,
            train_val_metrics: train_result.metrics,
            holdout_metrics: holdout_result.metrics,
            degradation,
            confidence,
            failure_reasons,
            passed,
        })
    }
}
