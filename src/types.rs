//! Core data types for the validation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A realized trade produced by the backtest engine.
///
/// Trades are immutable inputs to every analyzer. The permutation
/// feature-importance calculator copies them when it needs to substitute
/// shuffled outcomes; nothing in this crate mutates a trade in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub size: f64,
    /// Net profit in account currency.
    pub pnl: f64,
    /// Net profit as a percent of entry value.
    pub pnl_pct: f64,
    pub fees: f64,
    /// Signal types that contributed to the entry decision.
    /// A trade may carry more than one tag.
    pub signal_tags: Vec<String>,
}

impl TradeRecord {
    /// Check whether the trade closed at a profit.
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// Holding period between entry and exit.
    pub fn holding_period(&self) -> chrono::Duration {
        self.exit_time.signed_duration_since(self.entry_time)
    }

    /// Check whether the given signal tag contributed to this trade.
    pub fn has_signal(&self, tag: &str) -> bool {
        self.signal_tags.iter().any(|t| t == tag)
    }
}

/// A contiguous time window over historical data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Duration of the range in days. Fractional days are allowed.
    pub fn duration_days(&self) -> f64 {
        self.end.signed_duration_since(self.start).num_seconds() as f64 / 86_400.0
    }

    /// Check whether a timestamp falls inside the range (start inclusive,
    /// end exclusive).
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    /// Check that the range is non-empty.
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Named numeric strategy parameters.
///
/// A `BTreeMap` keeps iteration order deterministic, which in turn keeps
/// perturbation job ordering and ranking tie-breaks reproducible.
pub type ParameterSet = BTreeMap<String, f64>;

/// Aggregate statistics over a set of trades.
///
/// Produced by the backtest engine; consumed read-only by every analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration_days: f64,
    /// Fraction of winning trades in [0, 1].
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_trades: usize,
    pub avg_holding_period_days: f64,
}

/// Trade-level results plus their aggregate metrics, as returned by the
/// backtest runner for one (parameter set, time window) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
}

/// Backtest execution collaborator supplied by the host application.
///
/// The host closes over its own market data and strategy configuration; this
/// crate only narrows the time window and substitutes parameter sets. A
/// failure aborts the enclosing validation step and is never retried here.
pub trait BacktestRunner: Send + Sync {
    /// Run one backtest with the given parameters over the given window.
    fn run(&self, params: &ParameterSet, range: &TimeRange) -> Result<PerformanceResult>;
}

/// Parameter search collaborator supplied by the host application.
///
/// Invoked once per training window. The holdout validator never calls this
/// with a holdout range.
pub trait ParameterOptimizer: Send + Sync {
    /// Search for the best parameters over the given window.
    fn optimize(&self, range: &TimeRange) -> Result<ParameterSet>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade() -> TradeRecord {
        let entry = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        let exit = Utc.with_ymd_and_hms(2024, 1, 17, 9, 30, 0).unwrap();
        TradeRecord {
            id: "t-1".to_string(),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            entry_price: 150.0,
            entry_time: entry,
            exit_price: 156.0,
            exit_time: exit,
            size: 100.0,
            pnl: 600.0,
            pnl_pct: 4.0,
            fees: 2.0,
            signal_tags: vec!["momentum".to_string(), "breakout".to_string()],
        }
    }

    #[test]
    fn test_trade_helpers() {
        let trade = sample_trade();
        assert!(trade.is_winner());
        assert_eq!(trade.holding_period().num_days(), 2);
        assert!(trade.has_signal("momentum"));
        assert!(!trade.has_signal("mean_reversion"));
    }

    #[test]
    fn test_time_range_duration() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
        );
        assert!((range.duration_days() - 364.0).abs() < 1e-9);
        assert!(range.is_valid());
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
        );
        assert!(range.contains(range.start));
        assert!(!range.contains(range.end));
        assert!(range.contains(Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let back: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, trade.id);
        assert_eq!(back.signal_tags, trade.signal_tags);
        assert!((back.pnl - trade.pnl).abs() < f64::EPSILON);
    }
}
