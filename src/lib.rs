//! Crucible - strategy validation and overfit detection for quantitative trading.
//!
//! # Overview
//!
//! Crucible judges whether a backtested trading strategy reflects a real
//! statistical edge or an artifact of fitting noise, and renders a
//! GO / NO_GO / CONDITIONAL deployment decision. It does not execute trades,
//! fetch market data, or optimize parameters; it drives those collaborators
//! through narrow traits and scores what comes back:
//!
//! - **Holdout validation**: optimize on a training window, evaluate once on
//!   a never-touched holdout window, measure degradation
//! - **Parameter perturbation**: nudge each optimized parameter and measure
//!   how fast the edge evaporates
//! - **Permutation feature importance**: shuffle per-signal outcomes to
//!   estimate each signal's contribution
//! - **Overfit detection**: combine degradation, parameter stability,
//!   complexity, distribution, and time-stability indicators into one
//!   overfit probability
//! - **Validation reports**: compose every finding, plus optional
//!   walk-forward and Monte Carlo results, into a scored report with a
//!   final decision
//!
//! # Quick Start
//!
//! ```no_run
//! use crucible::{
//!     holdout::{HoldoutConfig, HoldoutValidator},
//!     types::{BacktestRunner, ParameterOptimizer},
//! };
//! use chrono::{TimeZone, Utc};
//!
//! # fn runner() -> Box<dyn BacktestRunner> { unimplemented!() }
//! # fn optimizer() -> Box<dyn ParameterOptimizer> { unimplemented!() }
//! let validator = HoldoutValidator::new(HoldoutConfig::default());
//! let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
//!
//! let validation = validator
//!     .validate(start, end, optimizer().as_ref(), runner().as_ref())
//!     .unwrap();
//! println!("{}", validation.summary());
//! ```
//!
//! # Modules
//!
//! - [`types`]: Core data types (TradeRecord, PerformanceMetrics, collaborator traits)
//! - [`metrics`]: Metric extraction, degradation ratios, statistical helpers
//! - [`holdout`]: Holdout (out-of-sample) validation
//! - [`perturbation`]: Parameter perturbation testing
//! - [`importance`]: Permutation feature importance
//! - [`overfit`]: Composite overfit detection
//! - [`report`]: Validation report generation and rendering
//! - [`config`]: TOML configuration file support

pub mod config;
pub mod error;
pub mod holdout;
pub mod importance;
pub mod metrics;
pub mod overfit;
pub mod perturbation;
pub mod report;
pub mod types;

// Re-exports for convenience
pub use config::ValidationFileConfig;
pub use error::{Result, ValidationError};
pub use types::{
    BacktestRunner, ParameterOptimizer, ParameterSet, PerformanceMetrics, PerformanceResult,
    Side, TimeRange, TradeRecord,
};

// Metric vocabulary
pub use metrics::{DegradationDetail, MetricKind};

// Holdout validation
pub use holdout::{
    ConfidenceAssessment, ConfidenceLevel, HoldoutConfig, HoldoutSplit, HoldoutValidation,
    HoldoutValidator,
};

// Parameter perturbation
pub use perturbation::{
    ParameterPerturbationResult, PerturbationAnalysis, PerturbationConfig, PerturbationLevel,
    PerturbationTester,
};

// Feature importance
pub use importance::{
    FeatureImportanceCalculator, FeatureImportanceResult, FeatureScore, ImportanceConfig,
};

// Overfit detection
pub use overfit::{
    OverfitAnalysis, OverfitConfig, OverfitDetector, OverfitIndicators, QuickCheck,
    SeverityLevel,
};

// Report generation
pub use report::{
    CalibrationSummary, Decision, MonteCarloSummary, ReportConfig, ReportFormatter,
    ReportGenerator, ReportSection, ValidationDecision, ValidationReport, WalkForwardSummary,
};
