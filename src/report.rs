//! Validation report generation.
//!
//! Composes the findings of the individual analyzers, plus optional
//! pre-computed walk-forward and Monte Carlo results, into a single report
//! with an overall score and a final deployment decision. A missing check is
//! never silently counted as a pass: absent sections are marked not included,
//! carry a standard "not performed" issue, and drop out of the weighted
//! score entirely.
//!
//! The decision is a strict state machine: a critical overfit severity or a
//! collapsed walk-forward consistency ratio forces NO_GO regardless of how
//! high the numeric score is.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style};
use uuid::Uuid;

use crate::error::Result;
use crate::overfit::{OverfitAnalysis, SeverityLevel};
use crate::types::PerformanceMetrics;

/// Pre-computed walk-forward analysis summary, supplied by the host.
/// This crate reads it; it never computes walk-forward results itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardSummary {
    pub num_windows: usize,
    /// Fraction of windows with positive out-of-sample performance.
    pub consistency_ratio: f64,
    pub avg_oos_sharpe: f64,
    /// In-sample to out-of-sample degradation fraction.
    pub degradation: f64,
}

/// Pre-computed Monte Carlo simulation summary, supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub num_simulations: usize,
    pub statistically_significant: bool,
    pub p_value: f64,
    pub probability_of_ruin: f64,
    /// Confidence interval for the simulated total return.
    pub return_ci: (f64, f64),
}

/// Pre-computed prediction-market calibration summary, supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub num_predictions: usize,
    /// Mean absolute difference between forecast and realized frequencies.
    pub calibration_error: f64,
    pub brier_score: f64,
}

/// Configuration for report generation. Every threshold is materialized at
/// construction and never re-derived per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub weight_backtest: f64,
    pub weight_walk_forward: f64,
    pub weight_monte_carlo: f64,
    pub weight_overfit: f64,
    pub weight_calibration: f64,
    /// Overall score floor for the report to pass.
    pub min_overall_score: f64,
    /// Score at or above which a passing report earns a GO decision.
    pub go_score: f64,
    /// Score at or above which a non-GO report earns CONDITIONAL.
    pub conditional_score: f64,
    pub max_probability_of_ruin: f64,
    pub min_wf_consistency: f64,
    pub min_wf_oos_sharpe: f64,
    pub max_wf_degradation: f64,
    /// Walk-forward consistency below this forces NO_GO outright.
    pub critical_wf_consistency: f64,
    pub max_calibration_error: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            weight_backtest: 0.2,
            weight_walk_forward: 0.3,
            weight_monte_carlo: 0.2,
            weight_overfit: 0.2,
            weight_calibration: 0.1,
            min_overall_score: 0.6,
            go_score: 0.8,
            conditional_score: 0.5,
            max_probability_of_ruin: 0.05,
            min_wf_consistency: 0.5,
            min_wf_oos_sharpe: 0.5,
            max_wf_degradation: 0.5,
            critical_wf_consistency: 0.4,
            max_calibration_error: 0.1,
        }
    }
}

/// One section of the validation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    pub name: String,
    pub included: bool,
    pub passed: bool,
    pub issues: Vec<String>,
}

impl ReportSection {
    fn not_performed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            included: false,
            passed: false,
            issues: vec![format!("{} analysis not performed", name)],
        }
    }

    fn evaluated(name: &str, issues: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            included: true,
            passed: issues.is_empty(),
            issues,
        }
    }
}

/// Final deployment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Go,
    NoGo,
    Conditional,
}

impl Decision {
    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::NoGo => "NO_GO",
            Self::Conditional => "CONDITIONAL",
        }
    }
}

/// Decision plus the reasoning behind it and any remediation conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDecision {
    pub decision: Decision,
    pub confidence: f64,
    pub reasoning: String,
    /// Remediation items for a CONDITIONAL decision.
    pub conditions: Vec<String>,
}

/// Composed, read-only validation report. Re-validation produces a new
/// report; reports are never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub report_id: Uuid,
    pub strategy_id: String,
    pub generated_at: DateTime<Utc>,
    pub backtest_metrics: PerformanceMetrics,
    pub backtest: ReportSection,
    pub walk_forward: ReportSection,
    pub monte_carlo: ReportSection,
    pub overfit: ReportSection,
    pub calibration: ReportSection,
    pub overfit_probability: Option<f64>,
    pub overfit_severity: Option<SeverityLevel>,
    pub overall_score: f64,
    pub passed: bool,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub decision: ValidationDecision,
}

impl ValidationReport {
    /// Machine-readable JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable multi-section text rendering.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Validation Report: {}\n\
             ==============================\n\
             Decision: {} (confidence {:.2})\n\
             Overall Score: {:.2}\n\
             Overall Result: {}\n\
             \n\
             Backtest: Sharpe {:.2}, Return {:.2}%, {} trades, Win Rate {:.0}%\n",
            self.strategy_id,
            self.decision.decision.label(),
            self.decision.confidence,
            self.overall_score,
            if self.passed { "PASSED" } else { "FAILED" },
            self.backtest_metrics.sharpe_ratio,
            self.backtest_metrics.total_return_pct,
            self.backtest_metrics.total_trades,
            self.backtest_metrics.win_rate * 100.0,
        );

        for section in [
            &self.backtest,
            &self.walk_forward,
            &self.monte_carlo,
            &self.overfit,
            &self.calibration,
        ] {
            out.push_str(&format!(
                "\n[{}] {}\n",
                section.name,
                if !section.included {
                    "not performed"
                } else if section.passed {
                    "passed"
                } else {
                    "failed"
                }
            ));
            for issue in &section.issues {
                out.push_str(&format!("  - {}\n", issue));
            }
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                out.push_str(&format!("  - {}\n", warning));
            }
        }
        if !self.recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for recommendation in &self.recommendations {
                out.push_str(&format!("  - {}\n", recommendation));
            }
        }
        if !self.decision.conditions.is_empty() {
            out.push_str("\nConditions for deployment:\n");
            for condition in &self.decision.conditions {
                out.push_str(&format!("  - {}\n", condition));
            }
        }

        out.push_str(&format!("\nReasoning: {}\n", self.decision.reasoning));
        out
    }
}

/// Validation report generator.
pub struct ReportGenerator {
    config: ReportConfig,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(ReportConfig::default())
    }
}

impl ReportGenerator {
    /// Create a new report generator.
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Compose a validation report. Any optional input left out produces a
    /// section marked not included with a standard "not performed" issue.
    pub fn generate(
        &self,
        strategy_id: &str,
        backtest_metrics: &PerformanceMetrics,
        walk_forward: Option<&WalkForwardSummary>,
        monte_carlo: Option<&MonteCarloSummary>,
        overfit: Option<&OverfitAnalysis>,
        calibration: Option<&CalibrationSummary>,
    ) -> ValidationReport {
        let backtest = self.backtest_section(backtest_metrics);
        let walk_forward_section = self.walk_forward_section(walk_forward);
        let monte_carlo_section = self.monte_carlo_section(monte_carlo);
        let overfit_section = self.overfit_section(overfit);
        let calibration_section = self.calibration_section(calibration);

        let overall_score = self.overall_score(
            backtest_metrics,
            &walk_forward_section,
            &monte_carlo_section,
            overfit,
            &overfit_section,
            &calibration_section,
        );

        // Boolean sections default to true when not included; the weighted
        // score above is where their absence is actually felt.
        let booleans = [
            section_pass_or_default(&walk_forward_section),
            section_pass_or_default(&monte_carlo_section),
            section_pass_or_default(&overfit_section),
            section_pass_or_default(&calibration_section),
        ];
        let passing = booleans.iter().filter(|&&b| b).count();
        let passed = passing >= 3 && overall_score >= self.config.min_overall_score;

        let mut warnings = Vec::new();
        for section in [
            &walk_forward_section,
            &monte_carlo_section,
            &overfit_section,
            &calibration_section,
        ] {
            if !section.included {
                warnings.push(format!(
                    "{} was not performed; its weight is excluded from the overall score",
                    section.name
                ));
            }
        }
        if backtest_metrics.total_trades < 30 {
            warnings.push(format!(
                "backtest sample of {} trades is small",
                backtest_metrics.total_trades
            ));
        }

        let recommendations = self.recommendations(
            &backtest,
            &walk_forward_section,
            &monte_carlo_section,
            &overfit_section,
            &calibration_section,
        );

        let decision = self.decide(
            walk_forward,
            overfit,
            passed,
            overall_score,
            &[
                &walk_forward_section,
                &monte_carlo_section,
                &overfit_section,
                &calibration_section,
            ],
        );

        ValidationReport {
            report_id: Uuid::new_v4(),
            strategy_id: strategy_id.to_string(),
            generated_at: Utc::now(),
            backtest_metrics: backtest_metrics.clone(),
            backtest,
            walk_forward: walk_forward_section,
            monte_carlo: monte_carlo_section,
            overfit: overfit_section,
            calibration: calibration_section,
            overfit_probability: overfit.map(|o| o.probability),
            overfit_severity: overfit.map(|o| o.severity),
            overall_score,
            passed,
            warnings,
            recommendations,
            decision,
        }
    }

    fn backtest_section(&self, metrics: &PerformanceMetrics) -> ReportSection {
        let mut issues = Vec::new();
        if metrics.sharpe_ratio <= 0.0 {
            issues.push(format!(
                "non-positive Sharpe ratio: {:.2}",
                metrics.sharpe_ratio
            ));
        }
        if metrics.total_return_pct <= 0.0 {
            issues.push(format!(
                "non-positive total return: {:.2}%",
                metrics.total_return_pct
            ));
        }
        ReportSection::evaluated("backtest", issues)
    }

    fn walk_forward_section(&self, summary: Option<&WalkForwardSummary>) -> ReportSection {
        let Some(wf) = summary else {
            return ReportSection::not_performed("walk-forward");
        };
        let mut issues = Vec::new();
        if wf.consistency_ratio < self.config.min_wf_consistency {
            issues.push(format!(
                "consistency ratio {:.2} below minimum {:.2}",
                wf.consistency_ratio, self.config.min_wf_consistency
            ));
        }
        if wf.avg_oos_sharpe < self.config.min_wf_oos_sharpe {
            issues.push(format!(
                "average OOS Sharpe {:.2} below minimum {:.2}",
                wf.avg_oos_sharpe, self.config.min_wf_oos_sharpe
            ));
        }
        if wf.degradation >= self.config.max_wf_degradation {
            issues.push(format!(
                "degradation {:.0}% at or above the {:.0}% limit",
                wf.degradation * 100.0,
                self.config.max_wf_degradation * 100.0
            ));
        }
        ReportSection::evaluated("walk-forward", issues)
    }

    fn monte_carlo_section(&self, summary: Option<&MonteCarloSummary>) -> ReportSection {
        let Some(mc) = summary else {
            return ReportSection::not_performed("monte-carlo");
        };
        let mut issues = Vec::new();
        if !mc.statistically_significant {
            issues.push(format!(
                "results not statistically significant (p = {:.3})",
                mc.p_value
            ));
        }
        if mc.probability_of_ruin > self.config.max_probability_of_ruin {
            issues.push(format!(
                "probability of ruin {:.1}% exceeds the {:.1}% cap",
                mc.probability_of_ruin * 100.0,
                self.config.max_probability_of_ruin * 100.0
            ));
        }
        ReportSection::evaluated("monte-carlo", issues)
    }

    fn overfit_section(&self, analysis: Option<&OverfitAnalysis>) -> ReportSection {
        let Some(overfit) = analysis else {
            return ReportSection::not_performed("overfit");
        };
        let mut issues = Vec::new();
        if !overfit.passed {
            issues.push(format!(
                "overfit probability {:.0}% with {} severity",
                overfit.probability * 100.0,
                overfit.severity
            ));
            issues.extend(overfit.likely_causes.iter().cloned());
        }
        ReportSection::evaluated("overfit", issues)
    }

    fn calibration_section(&self, summary: Option<&CalibrationSummary>) -> ReportSection {
        let Some(cal) = summary else {
            return ReportSection::not_performed("calibration");
        };
        let mut issues = Vec::new();
        if cal.calibration_error > self.config.max_calibration_error {
            issues.push(format!(
                "calibration error {:.3} exceeds the {:.3} limit",
                cal.calibration_error, self.config.max_calibration_error
            ));
        }
        ReportSection::evaluated("calibration", issues)
    }

    /// Weighted overall score, normalized over the weights of the sections
    /// actually included, and clamped to [0, 1].
    fn overall_score(
        &self,
        backtest_metrics: &PerformanceMetrics,
        walk_forward: &ReportSection,
        monte_carlo: &ReportSection,
        overfit: Option<&OverfitAnalysis>,
        overfit_section: &ReportSection,
        calibration: &ReportSection,
    ) -> f64 {
        let mut score_sum = self.config.weight_backtest
            * (backtest_metrics.sharpe_ratio / 2.0).min(1.0);
        let mut weight_sum = self.config.weight_backtest;

        if walk_forward.included {
            score_sum +=
                self.config.weight_walk_forward * if walk_forward.passed { 1.0 } else { 0.3 };
            weight_sum += self.config.weight_walk_forward;
        }
        if monte_carlo.included {
            score_sum +=
                self.config.weight_monte_carlo * if monte_carlo.passed { 1.0 } else { 0.3 };
            weight_sum += self.config.weight_monte_carlo;
        }
        if overfit_section.included {
            let contribution = if overfit_section.passed {
                1.0
            } else {
                1.0 - overfit.map(|o| o.probability).unwrap_or(1.0)
            };
            score_sum += self.config.weight_overfit * contribution;
            weight_sum += self.config.weight_overfit;
        }
        if calibration.included {
            score_sum +=
                self.config.weight_calibration * if calibration.passed { 1.0 } else { 0.5 };
            weight_sum += self.config.weight_calibration;
        }

        (score_sum / weight_sum).clamp(0.0, 1.0)
    }

    fn recommendations(
        &self,
        backtest: &ReportSection,
        walk_forward: &ReportSection,
        monte_carlo: &ReportSection,
        overfit: &ReportSection,
        calibration: &ReportSection,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();
        if !backtest.passed {
            recommendations
                .push("improve baseline backtest performance before validating".to_string());
        }
        if !walk_forward.included {
            recommendations.push("run walk-forward analysis before deployment".to_string());
        } else if !walk_forward.passed {
            recommendations
                .push("re-optimize with longer windows to improve walk-forward consistency"
                    .to_string());
        }
        if !monte_carlo.included {
            recommendations.push("run Monte Carlo simulation before deployment".to_string());
        } else if !monte_carlo.passed {
            recommendations
                .push("reduce position sizing to lower the probability of ruin".to_string());
        }
        if overfit.included && !overfit.passed {
            recommendations
                .push("simplify the strategy or expand the sample to reduce overfit risk"
                    .to_string());
        }
        if calibration.included && !calibration.passed {
            recommendations.push("recalibrate prediction confidence levels".to_string());
        }
        recommendations
    }

    /// Strict decision state machine. Rules are evaluated in order; the
    /// critical-overfit and collapsed-consistency rules pre-empt everything
    /// else regardless of score.
    fn decide(
        &self,
        walk_forward: Option<&WalkForwardSummary>,
        overfit: Option<&OverfitAnalysis>,
        passed: bool,
        overall_score: f64,
        sections: &[&ReportSection],
    ) -> ValidationDecision {
        if let Some(o) = overfit {
            if o.severity == SeverityLevel::Critical {
                return ValidationDecision {
                    decision: Decision::NoGo,
                    confidence: 0.9,
                    reasoning: format!(
                        "overfit severity is critical (probability {:.0}%); the backtested \
                         edge is very unlikely to survive live trading",
                        o.probability * 100.0
                    ),
                    conditions: Vec::new(),
                };
            }
        }

        if let Some(wf) = walk_forward {
            if wf.consistency_ratio < self.config.critical_wf_consistency {
                return ValidationDecision {
                    decision: Decision::NoGo,
                    confidence: 0.85,
                    reasoning: format!(
                        "walk-forward consistency ratio {:.2} is below the {:.2} floor; \
                         performance does not hold up across time windows",
                        wf.consistency_ratio, self.config.critical_wf_consistency
                    ),
                    conditions: Vec::new(),
                };
            }
        }

        if passed && overall_score >= self.config.go_score {
            return ValidationDecision {
                decision: Decision::Go,
                confidence: overall_score,
                reasoning: format!(
                    "all validation checks passed with an overall score of {:.2}",
                    overall_score
                ),
                conditions: Vec::new(),
            };
        }

        if overall_score >= self.config.conditional_score {
            let conditions: Vec<String> = sections
                .iter()
                .filter(|s| !s.passed)
                .flat_map(|s| {
                    s.issues
                        .iter()
                        .map(|issue| format!("resolve {}: {}", s.name, issue))
                })
                .collect();
            return ValidationDecision {
                decision: Decision::Conditional,
                confidence: 0.6,
                reasoning: format!(
                    "overall score {:.2} is promising but validation gaps remain",
                    overall_score
                ),
                conditions,
            };
        }

        ValidationDecision {
            decision: Decision::NoGo,
            confidence: 0.7,
            reasoning: format!(
                "overall score {:.2} is below the {:.2} conditional threshold",
                overall_score, self.config.conditional_score
            ),
            conditions: Vec::new(),
        }
    }
}

/// Terminal report printer.
pub struct ReportFormatter;

impl ReportFormatter {
    /// Print a colored, multi-section report to stdout.
    pub fn print_report(report: &ValidationReport) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", " STRATEGY VALIDATION REPORT ".bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        println!("{}", "Overview".bold().underline());
        println!("  Strategy:      {}", report.strategy_id);
        println!("  Generated:     {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Overall Score: {:.2}", report.overall_score);
        println!(
            "  Result:        {}",
            if report.passed {
                "PASSED".green().to_string()
            } else {
                "FAILED".red().to_string()
            }
        );
        println!();

        println!("{}", "Sections".bold().underline());
        let mut builder = Builder::new();
        builder.push_record(["Section", "Included", "Status", "Issues"]);
        for section in [
            &report.backtest,
            &report.walk_forward,
            &report.monte_carlo,
            &report.overfit,
            &report.calibration,
        ] {
            builder.push_record([
                section.name.clone(),
                if section.included { "yes" } else { "no" }.to_string(),
                if section.passed { "pass" } else { "fail" }.to_string(),
                section.issues.len().to_string(),
            ]);
        }
        let table = builder.build().with(Style::rounded()).to_string();
        println!("{}", table);
        println!();

        let decision_label = match report.decision.decision {
            Decision::Go => report.decision.decision.label().green().bold(),
            Decision::NoGo => report.decision.decision.label().red().bold(),
            Decision::Conditional => report.decision.decision.label().yellow().bold(),
        };
        println!(
            "Decision: {}  (confidence {:.2})",
            decision_label, report.decision.confidence
        );
        println!("  {}", report.decision.reasoning);
        for condition in &report.decision.conditions {
            println!("  - {}", condition);
        }
        println!();
        println!("{}", "═".repeat(60).blue());
    }
}

fn section_pass_or_default(section: &ReportSection) -> bool {
    if section.included {
        section.passed
    } else {
        true
    }
}
