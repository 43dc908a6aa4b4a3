//! Composite overfit detection.
//!
//! Combines five indicator families into a single overfit probability:
//! in-sample to out-of-sample degradation, parameter stability across
//! repeated optimization runs, model complexity relative to sample size,
//! return-distribution shape, and performance stability over time.
//!
//! Each indicator degrades gracefully: degenerate inputs (too few trades,
//! too little history) resolve to documented neutral defaults instead of
//! failing, so one starved indicator can never block the others. The
//! composite is deterministic for identical inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::metrics::{
    coefficient_of_variation, jarque_bera, kurtosis, lag1_autocorrelation, linear_trend_slope,
    mean, skewness, DegradationDetail,
};
use crate::types::{ParameterSet, PerformanceMetrics, TradeRecord};

/// Configuration for overfit detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverfitConfig {
    /// Maximum acceptable Sharpe degradation before the indicator fires.
    pub max_sharpe_degradation: f64,
    /// Maximum acceptable return degradation before the indicator fires.
    pub max_return_degradation: f64,
    /// Minimum parameter stability score.
    pub min_stability_score: f64,
    /// Minimum sample size (trade count) before complexity penalties apply.
    pub min_sample_size: usize,
    /// Maximum parameters-per-trade ratio.
    pub max_params_per_trade: f64,
    /// Significance level for the normality approximation.
    pub significance_level: f64,
}

impl Default for OverfitConfig {
    fn default() -> Self {
        Self {
            max_sharpe_degradation: 0.3,
            max_return_degradation: 0.4,
            min_stability_score: 0.5,
            min_sample_size: 100,
            max_params_per_trade: 0.1,
            significance_level: 0.05,
        }
    }
}

/// In-sample vs out-of-sample degradation indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationIndicator {
    pub detail: DegradationDetail,
    pub is_concerning: bool,
}

/// Parameter stability across a history of optimization runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterStabilityIndicator {
    /// Coefficient of variation per parameter across the history.
    pub per_parameter_cv: BTreeMap<String, f64>,
    /// Parameters whose CV exceeds 0.5.
    pub unstable_parameters: Vec<String>,
    /// `max(0, 1 - mean(CV))`.
    pub stability_score: f64,
    pub is_concerning: bool,
}

/// Model complexity relative to the available sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityIndicator {
    pub num_parameters: usize,
    pub sample_size: usize,
    pub parameters_per_trade: f64,
    /// `max(0, sample_size - num_parameters - 1)`.
    pub degrees_of_freedom: usize,
    /// Accumulated complexity penalty, clamped to 1.
    pub overfit_score: f64,
    pub is_concerning: bool,
}

/// Shape of the per-trade return distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionIndicator {
    pub skewness: f64,
    pub kurtosis: f64,
    pub jarque_bera: f64,
    /// Approximate normality p-value `exp(-JB/2)`.
    pub normality_p_value: f64,
    /// Win rate above 0.7 with average win exceeding average loss magnitude.
    pub suspiciously_good: bool,
    /// Lag-1 autocorrelation of per-trade returns.
    pub autocorrelation: f64,
    pub is_concerning: bool,
}

/// Performance stability across time quarters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeStabilityIndicator {
    /// Summed percent return per quarter of the combined trade sequence.
    pub quarter_returns: Vec<f64>,
    /// `max(0, 1 - CV(quarter returns))`.
    pub time_consistency: f64,
    /// Linear-regression slope of quarter index vs quarter return.
    pub performance_trend: f64,
    /// Sign changes between consecutive quarters.
    pub regime_changes: usize,
    pub is_concerning: bool,
}

/// All five indicator families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverfitIndicators {
    pub degradation: DegradationIndicator,
    pub parameter_stability: ParameterStabilityIndicator,
    pub complexity: ComplexityIndicator,
    pub distribution: DistributionIndicator,
    pub time_stability: TimeStabilityIndicator,
}

impl OverfitIndicators {
    /// Number of indicators currently flagged as concerning.
    pub fn concerning_count(&self) -> usize {
        [
            self.degradation.is_concerning,
            self.parameter_stability.is_concerning,
            self.complexity.is_concerning,
            self.distribution.is_concerning,
            self.time_stability.is_concerning,
        ]
        .iter()
        .filter(|&&c| c)
        .count()
    }
}

/// Severity classification of the composite probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    /// Map a composite probability to its severity band.
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.25 {
            Self::Low
        } else if probability < 0.5 {
            Self::Medium
        } else if probability < 0.75 {
            Self::High
        } else {
            Self::Critical
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Complete overfit analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverfitAnalysis {
    /// Composite overfit probability in [0, 1].
    pub probability: f64,
    pub severity: SeverityLevel,
    /// `min(1, 0.5 + 0.1 × concerning indicator count)`.
    pub confidence: f64,
    pub indicators: OverfitIndicators,
    pub likely_causes: Vec<String>,
    pub passed: bool,
}

impl OverfitAnalysis {
    /// Plain-text summary of the analysis.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Overfit Analysis Summary:\n\
             Probability: {:.1}%\n\
             Severity: {}\n\
             Confidence: {:.2}\n\
             Result: {}\n",
            self.probability * 100.0,
            self.severity,
            self.confidence,
            if self.passed { "PASSED" } else { "FAILED" }
        );
        if !self.likely_causes.is_empty() {
            out.push_str("Likely causes:\n");
            for cause in &self.likely_causes {
                out.push_str(&format!("  - {}\n", cause));
            }
        }
        out
    }
}

/// Result of the fast pre-flight heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickCheck {
    pub overfit_likely: bool,
    /// Reason string of the first heuristic that fired.
    pub reason: Option<String>,
}

/// Composite weights of the five indicator families.
const WEIGHT_DEGRADATION: f64 = 0.35;
const WEIGHT_INSTABILITY: f64 = 0.20;
const WEIGHT_COMPLEXITY: f64 = 0.25;
const WEIGHT_DISTRIBUTION: f64 = 0.10;
const WEIGHT_TIME: f64 = 0.10;

/// Overfit detector. Pure with respect to its configuration and inputs.
pub struct OverfitDetector {
    config: OverfitConfig,
}

impl OverfitDetector {
    /// Create a new overfit detector.
    pub fn new(config: OverfitConfig) -> Self {
        Self { config }
    }

    /// Run the full composite analysis.
    ///
    /// `parameter_history` holds the parameter sets produced by repeated
    /// optimization runs; fewer than two entries is treated as perfectly
    /// stable, since there is no data to judge instability from.
    pub fn detect(
        &self,
        in_sample_metrics: &PerformanceMetrics,
        out_of_sample_metrics: &PerformanceMetrics,
        in_sample_trades: &[TradeRecord],
        out_of_sample_trades: &[TradeRecord],
        parameter_history: &[ParameterSet],
    ) -> OverfitAnalysis {
        let degradation = self.degradation_indicator(in_sample_metrics, out_of_sample_metrics);
        let parameter_stability = self.stability_indicator(parameter_history);
        let complexity =
            self.complexity_indicator(parameter_history, in_sample_trades.len());
        let distribution = self.distribution_indicator(in_sample_metrics, in_sample_trades);
        let time_stability =
            self.time_stability_indicator(in_sample_trades, out_of_sample_trades);

        let distribution_component = if distribution.suspiciously_good {
            0.8
        } else if distribution.is_concerning {
            0.5
        } else {
            0.0
        };

        let probability = (WEIGHT_DEGRADATION * (degradation.detail.average * 2.0).min(1.0)
            + WEIGHT_INSTABILITY * (1.0 - parameter_stability.stability_score)
            + WEIGHT_COMPLEXITY * complexity.overfit_score
            + WEIGHT_DISTRIBUTION * distribution_component
            + WEIGHT_TIME * (1.0 - time_stability.time_consistency))
            .clamp(0.0, 1.0);

        let indicators = OverfitIndicators {
            degradation,
            parameter_stability,
            complexity,
            distribution,
            time_stability,
        };

        let likely_causes = self.likely_causes(&indicators);
        let concerning = indicators.concerning_count();
        let confidence = (0.5 + 0.1 * concerning as f64).min(1.0);
        let severity = SeverityLevel::from_probability(probability);
        let passed =
            probability < 0.5 && !likely_causes.iter().any(|c| c.contains("critical"));

        info!(
            probability,
            severity = severity.label(),
            concerning,
            passed,
            "overfit detection complete"
        );

        OverfitAnalysis {
            probability,
            severity,
            confidence,
            indicators,
            likely_causes,
            passed,
        }
    }

    /// Fast boolean heuristic for pre-flight gating. The first matching
    /// check wins and supplies the reason string.
    pub fn quick_check(
        &self,
        in_sample_sharpe: f64,
        out_of_sample_sharpe: f64,
        num_parameters: usize,
        num_trades: usize,
    ) -> QuickCheck {
        let sharpe_degradation =
            crate::metrics::degradation_ratio(in_sample_sharpe, out_of_sample_sharpe);
        if sharpe_degradation > self.config.max_sharpe_degradation {
            return QuickCheck {
                overfit_likely: true,
                reason: Some(format!(
                    "Sharpe degradation {:.0}% exceeds the {:.0}% threshold",
                    sharpe_degradation * 100.0,
                    self.config.max_sharpe_degradation * 100.0
                )),
            };
        }

        if num_trades > 0
            && num_parameters as f64 / num_trades as f64 > self.config.max_params_per_trade
        {
            return QuickCheck {
                overfit_likely: true,
                reason: Some(format!(
                    "{} parameters against {} trades exceeds the {:.2} parameters-per-trade ratio",
                    num_parameters, num_trades, self.config.max_params_per_trade
                )),
            };
        }

        if num_trades < self.config.min_sample_size {
            return QuickCheck {
                overfit_likely: true,
                reason: Some(format!(
                    "sample of {} trades is below the minimum of {}",
                    num_trades, self.config.min_sample_size
                )),
            };
        }

        if in_sample_sharpe > 0.5 && out_of_sample_sharpe < 0.0 {
            return QuickCheck {
                overfit_likely: true,
                reason: Some(
                    "positive in-sample Sharpe with negative out-of-sample Sharpe".to_string(),
                ),
            };
        }

        QuickCheck {
            overfit_likely: false,
            reason: None,
        }
    }

    fn degradation_indicator(
        &self,
        in_sample: &PerformanceMetrics,
        out_of_sample: &PerformanceMetrics,
    ) -> DegradationIndicator {
        let detail = DegradationDetail::between(in_sample, out_of_sample);
        let is_concerning = detail.sharpe > self.config.max_sharpe_degradation
            || detail.returns > self.config.max_return_degradation
            || detail.average > 0.4;
        DegradationIndicator {
            detail,
            is_concerning,
        }
    }

    fn stability_indicator(&self, history: &[ParameterSet]) -> ParameterStabilityIndicator {
        // With fewer than two optimization runs there is no data to judge
        // instability from; treat the parameters as perfectly stable.
        if history.len() < 2 {
            return ParameterStabilityIndicator {
                per_parameter_cv: BTreeMap::new(),
                unstable_parameters: Vec::new(),
                stability_score: 1.0,
                is_concerning: false,
            };
        }

        let mut values_by_name: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for params in history {
            for (name, &value) in params.iter() {
                values_by_name.entry(name.clone()).or_default().push(value);
            }
        }

        let per_parameter_cv: BTreeMap<String, f64> = values_by_name
            .iter()
            .map(|(name, values)| (name.clone(), coefficient_of_variation(values)))
            .collect();

        let unstable_parameters: Vec<String> = per_parameter_cv
            .iter()
            .filter(|(_, &cv)| cv > 0.5)
            .map(|(name, _)| name.clone())
            .collect();

        let cvs: Vec<f64> = per_parameter_cv.values().copied().collect();
        let stability_score = (1.0 - mean(&cvs)).max(0.0);

        ParameterStabilityIndicator {
            per_parameter_cv,
            unstable_parameters,
            is_concerning: stability_score < self.config.min_stability_score,
            stability_score,
        }
    }

    fn complexity_indicator(
        &self,
        history: &[ParameterSet],
        sample_size: usize,
    ) -> ComplexityIndicator {
        let num_parameters = history.last().map(|p| p.len()).unwrap_or(0);
        let parameters_per_trade = if sample_size == 0 {
            0.0
        } else {
            num_parameters as f64 / sample_size as f64
        };
        let degrees_of_freedom = sample_size.saturating_sub(num_parameters + 1);

        let mut overfit_score: f64 = 0.0;
        if sample_size < self.config.min_sample_size {
            overfit_score += 0.3;
        }
        if parameters_per_trade > self.config.max_params_per_trade {
            overfit_score += 0.4;
        }
        if degrees_of_freedom < 20 {
            overfit_score += 0.3;
        }
        let overfit_score = overfit_score.min(1.0);

        ComplexityIndicator {
            num_parameters,
            sample_size,
            parameters_per_trade,
            degrees_of_freedom,
            overfit_score,
            is_concerning: overfit_score > 0.5,
        }
    }

    fn distribution_indicator(
        &self,
        in_sample_metrics: &PerformanceMetrics,
        trades: &[TradeRecord],
    ) -> DistributionIndicator {
        // Too few trades to characterize a distribution: neutral defaults.
        if trades.len() < 10 {
            return DistributionIndicator {
                skewness: 0.0,
                kurtosis: 3.0,
                jarque_bera: 0.0,
                normality_p_value: 1.0,
                suspiciously_good: false,
                autocorrelation: 0.0,
                is_concerning: false,
            };
        }

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let skew = skewness(&returns);
        let kurt = kurtosis(&returns);
        let (jb, p_value) = jarque_bera(&returns);
        let autocorr = lag1_autocorrelation(&returns);

        let suspiciously_good = in_sample_metrics.win_rate > 0.7
            && in_sample_metrics.avg_win > in_sample_metrics.avg_loss.abs();

        let is_concerning = suspiciously_good
            || autocorr.abs() > 0.3
            || p_value < self.config.significance_level;

        DistributionIndicator {
            skewness: skew,
            kurtosis: kurt,
            jarque_bera: jb,
            normality_p_value: p_value,
            suspiciously_good,
            autocorrelation: autocorr,
            is_concerning,
        }
    }

    fn time_stability_indicator(
        &self,
        in_sample_trades: &[TradeRecord],
        out_of_sample_trades: &[TradeRecord],
    ) -> TimeStabilityIndicator {
        let combined: Vec<&TradeRecord> = in_sample_trades
            .iter()
            .chain(out_of_sample_trades.iter())
            .collect();

        // Too few trades to split meaningfully: neutral defaults.
        if combined.len() < 20 {
            return TimeStabilityIndicator {
                quarter_returns: Vec::new(),
                time_consistency: 1.0,
                performance_trend: 0.0,
                regime_changes: 0,
                is_concerning: false,
            };
        }

        // Four equal-sized quarters by trade order; the last quarter absorbs
        // the remainder.
        let quarter_size = combined.len() / 4;
        let mut quarter_returns = Vec::with_capacity(4);
        for q in 0..4 {
            let start = q * quarter_size;
            let end = if q == 3 { combined.len() } else { start + quarter_size };
            let sum: f64 = combined[start..end].iter().map(|t| t.pnl_pct).sum();
            quarter_returns.push(sum);
        }

        let time_consistency = (1.0 - coefficient_of_variation(&quarter_returns)).max(0.0);
        let performance_trend = linear_trend_slope(&quarter_returns);
        let regime_changes = quarter_returns
            .windows(2)
            .filter(|w| w[0] * w[1] < 0.0)
            .count();

        let is_concerning =
            time_consistency < 0.5 || performance_trend < -10.0 || regime_changes >= 2;

        TimeStabilityIndicator {
            quarter_returns,
            time_consistency,
            performance_trend,
            regime_changes,
            is_concerning,
        }
    }

    fn likely_causes(&self, indicators: &OverfitIndicators) -> Vec<String> {
        let mut causes = Vec::new();

        if indicators.degradation.is_concerning {
            if indicators.degradation.detail.average >= 0.6 {
                causes.push(format!(
                    "critical out-of-sample degradation (average {:.0}%)",
                    indicators.degradation.detail.average * 100.0
                ));
            } else {
                causes.push("significant performance degradation out-of-sample".to_string());
            }
        }

        if indicators.parameter_stability.is_concerning {
            causes.push(format!(
                "unstable parameters across optimization runs: {}",
                indicators.parameter_stability.unstable_parameters.join(", ")
            ));
        }

        if indicators.complexity.is_concerning {
            if indicators.complexity.overfit_score >= 0.8 {
                causes.push(
                    "critical model complexity relative to the available sample".to_string(),
                );
            } else {
                causes.push("model complexity high relative to sample size".to_string());
            }
        }

        if indicators.distribution.is_concerning {
            if indicators.distribution.suspiciously_good {
                causes.push("suspiciously favorable return distribution".to_string());
            }
            if indicators.distribution.autocorrelation.abs() > 0.3 {
                causes.push("serial correlation in trade returns".to_string());
            }
            if indicators.distribution.normality_p_value < self.config.significance_level {
                causes.push("non-normal return distribution".to_string());
            }
        }

        if indicators.time_stability.is_concerning {
            causes.push("inconsistent performance across time quarters".to_string());
        }

        causes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use chrono::{TimeZone, Utc};

    fn metrics(sharpe: f64, ret: f64, win: f64, pf: f64, trades: usize) -> PerformanceMetrics {
        PerformanceMetrics {
            sharpe_ratio: sharpe,
            total_return_pct: ret,
            win_rate: win,
            profit_factor: pf,
            total_trades: trades,
            avg_win: 100.0,
            avg_loss: -80.0,
            ..Default::default()
        }
    }

    fn trade(i: usize, pnl_pct: f64) -> TradeRecord {
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::days(i as i64);
        TradeRecord {
            id: format!("t-{}", i),
            symbol: "TEST".to_string(),
            side: Side::Buy,
            entry_price: 100.0,
            entry_time: entry,
            exit_price: 100.0 * (1.0 + pnl_pct / 100.0),
            exit_time: entry + chrono::Duration::hours(4),
            size: 1.0,
            pnl: pnl_pct * 10.0,
            pnl_pct,
            fees: 0.0,
            signal_tags: vec![],
        }
    }

    /// Mixed but steady returns: mostly small wins with periodic losses.
    fn steady_trades(n: usize) -> Vec<TradeRecord> {
        (0..n)
            .map(|i| {
                let pnl_pct = match i % 5 {
                    0 => -0.8,
                    1 => 0.6,
                    2 => 1.1,
                    3 => -0.3,
                    _ => 0.9,
                };
                trade(i, pnl_pct)
            })
            .collect()
    }

    fn history(sets: &[&[(&str, f64)]]) -> Vec<ParameterSet> {
        sets.iter()
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<ParameterSet>()
            })
            .collect()
    }

    #[test]
    fn test_healthy_strategy_passes() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let in_sample = metrics(1.8, 25.0, 0.58, 2.0, 150);
        let out_of_sample = metrics(1.6, 22.0, 0.55, 1.8, 50);
        let trades = steady_trades(150);
        let oos_trades = steady_trades(50);
        let hist = history(&[
            &[("fast", 10.0), ("slow", 50.0)],
            &[("fast", 10.5), ("slow", 48.0)],
            &[("fast", 9.8), ("slow", 51.0)],
        ]);

        let analysis = detector.detect(&in_sample, &out_of_sample, &trades, &oos_trades, &hist);
        assert!(analysis.probability < 0.5);
        assert!(analysis.passed);
        assert_eq!(analysis.severity, SeverityLevel::Low);
        assert!(!analysis.indicators.degradation.is_concerning);
        assert!(!analysis.indicators.parameter_stability.is_concerning);
    }

    #[test]
    fn test_severe_degradation_is_flagged() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let in_sample = metrics(2.5, 50.0, 0.7, 3.0, 150);
        let out_of_sample = metrics(0.2, 2.0, 0.4, 0.9, 50);
        let trades = steady_trades(150);
        let oos_trades = steady_trades(50);

        let analysis = detector.detect(&in_sample, &out_of_sample, &trades, &oos_trades, &[]);
        assert!(analysis.indicators.degradation.is_concerning);
        // Average degradation over 60% produces a cause mentioning critical.
        assert!(analysis
            .likely_causes
            .iter()
            .any(|c| c.contains("critical")));
        assert!(!analysis.passed);
    }

    #[test]
    fn test_parameter_instability() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let hist = history(&[
            &[("lookback", 5.0)],
            &[("lookback", 50.0)],
            &[("lookback", 200.0)],
            &[("lookback", 12.0)],
        ]);
        let m = metrics(1.5, 20.0, 0.55, 1.8, 150);
        let trades = steady_trades(150);

        let analysis = detector.detect(&m, &m, &trades, &[], &hist);
        let stability = &analysis.indicators.parameter_stability;
        assert!(stability.per_parameter_cv["lookback"] > 0.5);
        assert_eq!(stability.unstable_parameters, vec!["lookback".to_string()]);
        assert!(stability.stability_score < 0.5);
        assert!(stability.is_concerning);
    }

    #[test]
    fn test_short_history_is_perfectly_stable() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let hist = history(&[&[("lookback", 5.0)]]);
        let m = metrics(1.5, 20.0, 0.55, 1.8, 150);
        let trades = steady_trades(150);

        let analysis = detector.detect(&m, &m, &trades, &[], &hist);
        let stability = &analysis.indicators.parameter_stability;
        assert_eq!(stability.stability_score, 1.0);
        assert!(!stability.is_concerning);
        assert!(stability.per_parameter_cv.is_empty());
    }

    #[test]
    fn test_complexity_scoring() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        // 5 parameters against 12 trades: small sample (+0.3), ratio 0.42
        // over 0.1 (+0.4), degrees of freedom 6 under 20 (+0.3) => clamped 1.
        let hist = history(&[&[
            ("a", 1.0),
            ("b", 2.0),
            ("c", 3.0),
            ("d", 4.0),
            ("e", 5.0),
        ]]);
        let m = metrics(1.5, 20.0, 0.55, 1.8, 12);
        let trades = steady_trades(12);

        let analysis = detector.detect(&m, &m, &trades, &[], &hist);
        let complexity = &analysis.indicators.complexity;
        assert_eq!(complexity.num_parameters, 5);
        assert_eq!(complexity.degrees_of_freedom, 6);
        assert_eq!(complexity.overfit_score, 1.0);
        assert!(complexity.is_concerning);
    }

    #[test]
    fn test_distribution_neutral_below_ten_trades() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let m = metrics(1.5, 20.0, 0.9, 1.8, 5);
        let trades = steady_trades(5);

        let analysis = detector.detect(&m, &m, &trades, &[], &[]);
        let dist = &analysis.indicators.distribution;
        assert_eq!(dist.skewness, 0.0);
        assert_eq!(dist.kurtosis, 3.0);
        assert_eq!(dist.normality_p_value, 1.0);
        assert!(!dist.suspiciously_good);
        assert!(!dist.is_concerning);
    }

    #[test]
    fn test_suspiciously_good_distribution() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let mut m = metrics(2.0, 30.0, 0.75, 3.0, 150);
        m.avg_win = 150.0;
        m.avg_loss = -50.0;
        let trades = steady_trades(150);

        let analysis = detector.detect(&m, &m, &trades, &[], &[]);
        assert!(analysis.indicators.distribution.suspiciously_good);
        assert!(analysis.indicators.distribution.is_concerning);
        assert!(analysis
            .likely_causes
            .iter()
            .any(|c| c.contains("suspiciously")));
    }

    #[test]
    fn test_time_stability_neutral_below_twenty_trades() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let m = metrics(1.5, 20.0, 0.55, 1.8, 10);
        let trades = steady_trades(10);

        let analysis = detector.detect(&m, &m, &trades, &[], &[]);
        let time = &analysis.indicators.time_stability;
        assert_eq!(time.time_consistency, 1.0);
        assert_eq!(time.regime_changes, 0);
        assert!(!time.is_concerning);
        assert!(time.quarter_returns.is_empty());
    }

    #[test]
    fn test_regime_changes_counted() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        // 24 trades with alternating quarter signs: +,-,+,- => 3 changes.
        let mut trades = Vec::new();
        for i in 0..24 {
            let quarter = i / 6;
            let pnl_pct = if quarter % 2 == 0 { 1.0 } else { -1.0 };
            trades.push(trade(i, pnl_pct));
        }
        let m = metrics(1.5, 20.0, 0.55, 1.8, 24);

        let analysis = detector.detect(&m, &m, &trades, &[], &[]);
        let time = &analysis.indicators.time_stability;
        assert_eq!(time.quarter_returns.len(), 4);
        assert_eq!(time.regime_changes, 3);
        assert!(time.is_concerning);
    }

    #[test]
    fn test_composite_probability_formula() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let in_sample = metrics(2.0, 40.0, 0.6, 2.0, 150);
        let out_of_sample = metrics(1.0, 20.0, 0.5, 1.6, 50);
        let trades = steady_trades(150);
        let oos_trades = steady_trades(50);
        let hist = history(&[
            &[("fast", 10.0), ("slow", 50.0)],
            &[("fast", 12.0), ("slow", 45.0)],
        ]);

        let analysis = detector.detect(&in_sample, &out_of_sample, &trades, &oos_trades, &hist);

        let i = &analysis.indicators;
        let dist_component = if i.distribution.suspiciously_good {
            0.8
        } else if i.distribution.is_concerning {
            0.5
        } else {
            0.0
        };
        let expected = (0.35 * (i.degradation.detail.average * 2.0).min(1.0)
            + 0.20 * (1.0 - i.parameter_stability.stability_score)
            + 0.25 * i.complexity.overfit_score
            + 0.10 * dist_component
            + 0.10 * (1.0 - i.time_stability.time_consistency))
            .clamp(0.0, 1.0);
        assert!((analysis.probability - expected).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_scales_with_concerning_count() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let m = metrics(1.5, 20.0, 0.55, 1.8, 150);
        let trades = steady_trades(150);

        let base = detector.detect(&m, &m, &trades, &[], &[]);
        let expected = (0.5 + 0.1 * base.indicators.concerning_count() as f64).min(1.0);
        assert!((base.confidence - expected).abs() < 1e-10);

        let bad_is = metrics(2.5, 50.0, 0.7, 3.0, 150);
        let bad_oos = metrics(-0.5, -10.0, 0.3, 0.5, 50);
        let flagged = detector.detect(&bad_is, &bad_oos, &trades, &[], &[]);
        assert!(flagged.indicators.concerning_count() > base.indicators.concerning_count());
        let expected = (0.5 + 0.1 * flagged.indicators.concerning_count() as f64).min(1.0);
        assert!((flagged.confidence - expected).abs() < 1e-10);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(SeverityLevel::from_probability(0.1), SeverityLevel::Low);
        assert_eq!(SeverityLevel::from_probability(0.25), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_probability(0.49), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_probability(0.5), SeverityLevel::High);
        assert_eq!(SeverityLevel::from_probability(0.75), SeverityLevel::Critical);
        assert_eq!(SeverityLevel::from_probability(1.0), SeverityLevel::Critical);
    }

    #[test]
    fn test_quick_check_order() {
        let detector = OverfitDetector::new(OverfitConfig::default());

        // Sharpe degradation fires first even when other checks also match.
        let check = detector.quick_check(2.0, 0.5, 50, 10);
        assert!(check.overfit_likely);
        assert!(check.reason.unwrap().contains("Sharpe degradation"));

        // With acceptable degradation, the parameter ratio fires next.
        let check = detector.quick_check(1.0, 0.9, 50, 100);
        assert!(check.overfit_likely);
        assert!(check.reason.unwrap().contains("parameters"));

        // Then the sample-size floor.
        let check = detector.quick_check(1.0, 0.9, 2, 50);
        assert!(check.overfit_likely);
        assert!(check.reason.unwrap().contains("below the minimum"));

        // A clean profile passes every check.
        let check = detector.quick_check(0.6, 0.55, 2, 200);
        assert!(!check.overfit_likely);
        assert!(check.reason.is_none());
    }

    #[test]
    fn test_quick_check_sign_flip() {
        // A negative out-of-sample Sharpe against a positive in-sample one
        // always implies degradation over 1, so the sign-flip check can only
        // be reached when the degradation threshold is relaxed past it.
        let config = OverfitConfig {
            max_sharpe_degradation: 2.0,
            ..Default::default()
        };
        let detector = OverfitDetector::new(config);
        let check = detector.quick_check(0.6, -0.1, 2, 200);
        assert!(check.overfit_likely);
        assert!(check.reason.unwrap().contains("negative out-of-sample"));
    }

    #[test]
    fn test_detect_is_deterministic() {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let in_sample = metrics(1.8, 25.0, 0.58, 2.0, 150);
        let out_of_sample = metrics(1.2, 15.0, 0.52, 1.5, 50);
        let trades = steady_trades(150);
        let oos_trades = steady_trades(50);
        let hist = history(&[&[("fast", 10.0)], &[("fast", 11.0)]]);

        let a = detector.detect(&in_sample, &out_of_sample, &trades, &oos_trades, &hist);
        let b = detector.detect(&in_sample, &out_of_sample, &trades, &oos_trades, &hist);
        assert_eq!(a.probability.to_bits(), b.probability.to_bits());
        assert_eq!(a.likely_causes, b.likely_causes);
    }
}
