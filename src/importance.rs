//! Permutation feature importance for trade signals.
//!
//! Each executed trade is tagged with the signal types that produced it. To
//! estimate how much of the performance is attributable to a signal, the
//! calculator repeatedly shuffles the realized outcomes (pnl and pnl percent,
//! as a pair) of the trades carrying that signal among themselves, leaving
//! all other trades untouched, and recomputes the chosen metric over the full
//! trade set.
//!
//! Shuffling uses a seedable linear congruential generator. Every (signal,
//! trial) pair derives its own independent sub-stream from the master seed,
//! so the parallel fan-out over trials is bit-identical to sequential
//! execution under the same seed. An omitted seed falls back to a clock
//! seed, making the run explicitly non-deterministic.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::{Result, ValidationError};
use crate::metrics::{mean, sample_std, MetricKind};
use crate::types::{PerformanceMetrics, TradeRecord};

/// Configuration for permutation feature importance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceConfig {
    /// Number of independent permutation trials per signal.
    pub num_permutations: usize,
    /// Metric recomputed over each permuted trade set.
    pub metric: MetricKind,
    /// Minimum trade count; fewer is an insufficient-data error.
    pub min_trades: usize,
    /// Importance a signal must exceed to count as useful.
    pub min_importance_threshold: f64,
    /// P-value a signal must stay under to count as useful.
    pub max_p_value: f64,
    /// Master seed. `None` seeds from the clock (non-deterministic).
    pub seed: Option<u64>,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            num_permutations: 100,
            metric: MetricKind::Sharpe,
            min_trades: 20,
            min_importance_threshold: 0.05,
            max_p_value: 0.1,
            seed: None,
        }
    }
}

impl ImportanceConfig {
    /// Set the master seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the metric to recompute per trial.
    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Set the number of permutation trials per signal.
    pub fn with_permutations(mut self, n: usize) -> Self {
        self.num_permutations = n;
        self
    }
}

/// Simple LCG random number generator for reproducibility.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: splitmix64(seed),
        }
    }

    fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.state >> 33) as f64 / (1u64 << 31) as f64
    }

    fn random_index(&mut self, max: usize) -> usize {
        (self.next_f64() * max as f64) as usize % max
    }

    /// Fisher-Yates shuffle in place.
    fn shuffle<T>(&mut self, data: &mut [T]) {
        for i in (1..data.len()).rev() {
            let j = self.random_index(i + 1);
            data.swap(i, j);
        }
    }
}

/// One splitmix64 scrambling step, used for sub-stream derivation.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// FNV-1a hash over bytes, used to fold the signal name into its stream seed.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xCBF29CE484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001B3);
    }
    hash
}

/// Independent sub-stream seed for one (signal, trial) unit of work.
fn trial_seed(master: u64, signal: &str, trial: usize) -> u64 {
    splitmix64(
        master
            ^ fnv1a(signal.as_bytes())
            ^ (trial as u64).wrapping_mul(0x9E3779B97F4A7C15),
    )
}

/// Importance findings for a single signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScore {
    pub signal: String,
    /// Number of trades carrying this signal.
    pub trade_count: usize,
    /// `(baseline - mean(permuted)) / |baseline|`, 0 when the baseline is 0.
    pub importance: f64,
    /// Fraction of permutation trials whose metric reached the baseline.
    /// A high p-value means the signal's apparent contribution is
    /// indistinguishable from chance.
    pub p_value: f64,
    /// 95% confidence interval on the importance.
    pub confidence_interval: (f64, f64),
    pub mean_permuted: f64,
    /// Useful iff importance exceeds the threshold and the p-value stays
    /// under the configured maximum.
    pub is_useful: bool,
}

/// Complete feature-importance findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceResult {
    pub metric: MetricKind,
    /// Metric recomputed over the unshuffled trade set.
    pub baseline_metric: f64,
    /// Aggregate metrics snapshot supplied by the backtest engine.
    pub baseline_metrics: PerformanceMetrics,
    pub num_permutations: usize,
    /// Seed the run was configured with; `None` means non-deterministic.
    pub seed: Option<u64>,
    /// All signals, ranked by descending importance.
    pub scores: Vec<FeatureScore>,
    /// Signals worth keeping.
    pub recommended: Vec<String>,
    /// Signals whose contribution is indistinguishable from chance.
    pub droppable: Vec<String>,
    /// Fraction of signals judged useful.
    pub useful_fraction: f64,
}

impl FeatureImportanceResult {
    /// Plain-text summary of the importance ranking.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Feature Importance Summary:\n\
             Metric: {}\n\
             Baseline: {:.4}\n\
             Permutations per signal: {}\n\
             Useful signals: {}/{} ({:.0}%)\n",
            self.metric.display_name(),
            self.baseline_metric,
            self.num_permutations,
            self.recommended.len(),
            self.scores.len(),
            self.useful_fraction * 100.0
        );
        for score in &self.scores {
            out.push_str(&format!(
                "  {} importance {:+.4} (p={:.3}, n={}){}\n",
                score.signal,
                score.importance,
                score.p_value,
                score.trade_count,
                if score.is_useful { " USEFUL" } else { "" }
            ));
        }
        out
    }
}

/// Permutation feature-importance calculator.
pub struct FeatureImportanceCalculator {
    config: ImportanceConfig,
}

impl FeatureImportanceCalculator {
    /// Create a new calculator.
    pub fn new(config: ImportanceConfig) -> Self {
        Self { config }
    }

    /// Estimate the importance of every signal tag present in the trades.
    ///
    /// Fails with an insufficient-data error when the trade count is below
    /// the configured minimum; that check runs before any expensive work.
    pub fn calculate(
        &self,
        trades: &[TradeRecord],
        baseline_metrics: &PerformanceMetrics,
    ) -> Result<FeatureImportanceResult> {
        if self.config.num_permutations == 0 {
            return Err(ValidationError::ConfigError(
                "num_permutations must be positive".to_string(),
            ));
        }
        if trades.len() < self.config.min_trades {
            return Err(ValidationError::InsufficientData(format!(
                "feature importance needs at least {} trades, got {}",
                self.config.min_trades,
                trades.len()
            )));
        }

        let master_seed = self.config.seed.unwrap_or_else(clock_seed);
        let baseline_metric = self.config.metric.compute(trades);

        // Distinct signal tags, in deterministic order.
        let signals: BTreeSet<String> = trades
            .iter()
            .flat_map(|t| t.signal_tags.iter().cloned())
            .collect();
        if signals.is_empty() {
            warn!("no signal tags present; importance result is empty");
        }
        info!(
            num_signals = signals.len(),
            num_trades = trades.len(),
            baseline_metric,
            "starting permutation importance"
        );

        let mut scores: Vec<FeatureScore> = signals
            .iter()
            .map(|signal| {
                self.score_signal(signal, trades, baseline_metric, master_seed)
            })
            .collect();

        // Rank by descending importance; ties keep alphabetical order.
        scores.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let recommended: Vec<String> = scores
            .iter()
            .filter(|s| s.is_useful)
            .map(|s| s.signal.clone())
            .collect();
        let droppable: Vec<String> = scores
            .iter()
            .filter(|s| !s.is_useful)
            .map(|s| s.signal.clone())
            .collect();
        let useful_fraction = if scores.is_empty() {
            0.0
        } else {
            recommended.len() as f64 / scores.len() as f64
        };

        Ok(FeatureImportanceResult {
            metric: self.config.metric,
            baseline_metric,
            baseline_metrics: baseline_metrics.clone(),
            num_permutations: self.config.num_permutations,
            seed: self.config.seed,
            scores,
            recommended,
            droppable,
            useful_fraction,
        })
    }

    /// Run all permutation trials for one signal and score it.
    fn score_signal(
        &self,
        signal: &str,
        trades: &[TradeRecord],
        baseline_metric: f64,
        master_seed: u64,
    ) -> FeatureScore {
        let tagged: Vec<usize> = trades
            .iter()
            .enumerate()
            .filter(|(_, t)| t.has_signal(signal))
            .map(|(i, _)| i)
            .collect();

        let permuted: Vec<f64> = (0..self.config.num_permutations)
            .into_par_iter()
            .map(|trial| {
                let mut rng = Lcg::new(trial_seed(master_seed, signal, trial));

                // Shuffle the tagged trades' outcomes among themselves only;
                // trades not carrying the signal are untouched.
                let mut outcomes: Vec<(f64, f64)> = tagged
                    .iter()
                    .map(|&i| (trades[i].pnl, trades[i].pnl_pct))
                    .collect();
                rng.shuffle(&mut outcomes);

                let mut shuffled = trades.to_vec();
                for (slot, &i) in tagged.iter().enumerate() {
                    shuffled[i].pnl = outcomes[slot].0;
                    shuffled[i].pnl_pct = outcomes[slot].1;
                }

                self.config.metric.compute(&shuffled)
            })
            .collect();

        let mean_permuted = mean(&permuted);
        let importance = if baseline_metric == 0.0 {
            0.0
        } else {
            (baseline_metric - mean_permuted) / baseline_metric.abs()
        };

        let reached_baseline = permuted.iter().filter(|&&m| m >= baseline_metric).count();
        let p_value = reached_baseline as f64 / permuted.len() as f64;

        let standard_error = sample_std(&permuted) / (permuted.len() as f64).sqrt();
        let half_width = if baseline_metric == 0.0 {
            0.0
        } else {
            1.96 * standard_error / baseline_metric.abs()
        };

        let is_useful = importance > self.config.min_importance_threshold
            && p_value < self.config.max_p_value;

        FeatureScore {
            signal: signal.to_string(),
            trade_count: tagged.len(),
            importance,
            p_value,
            confidence_interval: (importance - half_width, importance + half_width),
            mean_permuted,
            is_useful,
        }
    }
}

/// Nanosecond clock seed for unseeded runs.
fn clock_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(12345)
}
