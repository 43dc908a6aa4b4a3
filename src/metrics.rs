//! Performance metric extraction and the shared statistics toolbox.
//!
//! Every analyzer in this crate speaks the same metric vocabulary: a closed
//! [`MetricKind`] enumeration with an extraction function per variant, the
//! [`DegradationDetail`] ratio block shared by the holdout validator and the
//! overfit detector, and the low-level statistical helpers (moments,
//! normality approximation, autocorrelation, trend slope) the detectors are
//! built on.

use serde::{Deserialize, Serialize};

use crate::types::{PerformanceMetrics, TradeRecord};

/// Annualization factor base for per-trade Sharpe ratios.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Profit factors are capped here before any degradation ratio is computed,
/// bounding the effect of near-infinite values from loss-free samples.
pub const PROFIT_FACTOR_CAP: f64 = 10.0;

/// Primary performance metric selector.
///
/// A closed enumeration rather than a string key: each variant knows how to
/// extract itself from an aggregate snapshot and how to recompute itself from
/// trade-level data. Unrecognized keys at the configuration boundary fall
/// back to total return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Sharpe,
    TotalReturn,
    WinRate,
    ProfitFactor,
}

impl MetricKind {
    /// Parse a metric key. Unknown keys fall back to `TotalReturn`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "sharpe" => Self::Sharpe,
            "total_return" => Self::TotalReturn,
            "win_rate" => Self::WinRate,
            "profit_factor" => Self::ProfitFactor,
            _ => Self::TotalReturn,
        }
    }

    /// Extract the metric value from an aggregate metrics snapshot.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe_ratio,
            Self::TotalReturn => metrics.total_return_pct,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor,
        }
    }

    /// Recompute the metric from trade-level data.
    pub fn compute(&self, trades: &[TradeRecord]) -> f64 {
        match self {
            Self::Sharpe => annualized_sharpe(trades),
            Self::TotalReturn => total_compounded_return_pct(trades),
            Self::WinRate => win_rate(trades),
            Self::ProfitFactor => profit_factor(trades),
        }
    }

    /// Display name for report rendering.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sharpe => "Sharpe Ratio",
            Self::TotalReturn => "Total Return %",
            Self::WinRate => "Win Rate",
            Self::ProfitFactor => "Profit Factor",
        }
    }
}

/// Annualized Sharpe ratio over per-trade percent returns (factor √252).
/// Fewer than two trades or zero dispersion resolves to 0.
pub fn annualized_sharpe(trades: &[TradeRecord]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
    let m = mean(&returns);
    let s = std_dev(&returns);
    if s < 1e-10 {
        return 0.0;
    }
    m / s * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Total compounded return over per-trade percent returns, as a percent.
pub fn total_compounded_return_pct(trades: &[TradeRecord]) -> f64 {
    let compounded = trades
        .iter()
        .fold(1.0, |acc, t| acc * (1.0 + t.pnl_pct / 100.0));
    (compounded - 1.0) * 100.0
}

/// Fraction of winning trades in [0, 1]. Empty input resolves to 0.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.pnl > 0.0).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit divided by gross loss. A loss-free sample with profits
/// resolves to infinity; an empty or flat sample resolves to 0.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss == 0.0 {
        if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        gross_profit / gross_loss
    }
}

/// Relative performance loss from `train` to `holdout`, clamped to [0, 1].
/// Resolves to 0 when the training value is non-positive.
pub fn degradation_ratio(train: f64, holdout: f64) -> f64 {
    if train <= 0.0 {
        return 0.0;
    }
    ((train - holdout) / train).clamp(0.0, 1.0)
}

/// Per-metric degradation ratios between an in-sample and an out-of-sample
/// metrics snapshot, plus their unweighted average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationDetail {
    pub sharpe: f64,
    pub returns: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Unweighted mean of the four ratios.
    pub average: f64,
}

impl DegradationDetail {
    /// Compute degradation ratios between two metrics snapshots.
    /// Profit factors are capped at [`PROFIT_FACTOR_CAP`] on both sides first.
    pub fn between(train: &PerformanceMetrics, holdout: &PerformanceMetrics) -> Self {
        let sharpe = degradation_ratio(train.sharpe_ratio, holdout.sharpe_ratio);
        let returns = degradation_ratio(train.total_return_pct, holdout.total_return_pct);
        let win_rate = degradation_ratio(train.win_rate, holdout.win_rate);
        let profit_factor = degradation_ratio(
            train.profit_factor.min(PROFIT_FACTOR_CAP),
            holdout.profit_factor.min(PROFIT_FACTOR_CAP),
        );
        let average = (sharpe + returns + win_rate + profit_factor) / 4.0;

        Self {
            sharpe,
            returns,
            win_rate,
            profit_factor,
            average,
        }
    }
}

/// Arithmetic mean. Empty input resolves to 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sample standard deviation (divides by n - 1), used for standard errors.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Coefficient of variation: std / |mean|. A near-zero mean resolves to 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.abs() < 1e-10 {
        return 0.0;
    }
    std_dev(values) / m.abs()
}

/// Population skewness. Zero dispersion resolves to 0.
pub fn skewness(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let m = mean(values);
    let s = std_dev(values);
    if s < 1e-10 {
        return 0.0;
    }
    let n = values.len() as f64;
    values.iter().map(|v| ((v - m) / s).powi(3)).sum::<f64>() / n
}

/// Population kurtosis (non-excess; a normal distribution scores 3).
/// Zero dispersion resolves to the neutral value 3.
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.len() < 4 {
        return 3.0;
    }
    let m = mean(values);
    let s = std_dev(values);
    if s < 1e-10 {
        return 3.0;
    }
    let n = values.len() as f64;
    values.iter().map(|v| ((v - m) / s).powi(4)).sum::<f64>() / n
}

/// Simplified Jarque-Bera normality test: `JB = (n/6)(skew² + (kurt-3)²/4)`
/// with the approximate p-value `exp(-JB/2)`.
///
/// The p-value approximation is deliberately not the textbook chi-squared
/// tail; downstream thresholds are tuned against this exact arithmetic.
pub fn jarque_bera(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.len() < 4 {
        return (0.0, 1.0);
    }
    let skew = skewness(values);
    let kurt = kurtosis(values);
    let jb = n / 6.0 * (skew.powi(2) + (kurt - 3.0).powi(2) / 4.0);
    (jb, (-jb / 2.0).exp())
}

/// Lag-1 autocorrelation. Fewer than two points or zero variance resolves to 0.
pub fn lag1_autocorrelation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let denominator: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denominator < 1e-10 {
        return 0.0;
    }
    let numerator: f64 = values
        .windows(2)
        .map(|w| (w[0] - m) * (w[1] - m))
        .sum();
    numerator / denominator
}

/// Least-squares slope of values against their index (0, 1, 2, ...).
pub fn linear_trend_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);

    let mut covariance = 0.0;
    let mut x_variance = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        covariance += dx * (y - y_mean);
        x_variance += dx * dx;
    }

    if x_variance < 1e-10 {
        return 0.0;
    }
    covariance / x_variance
}
