//! Property-based tests using proptest for fuzzing and invariant testing.
//!
//! These tests verify that:
//! 1. Degradation ratios stay in [0, 1] and vanish when performance holds up
//! 2. Holdout splits are exact and fail predictably when too short
//! 3. Confidence and overfit scores stay clamped under arbitrary inputs
//! 4. Seeded permutation importance is reproducible

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use crucible::holdout::{ConfidenceAssessment, ConfidenceLevel, HoldoutConfig, HoldoutValidator};
use crucible::importance::{FeatureImportanceCalculator, ImportanceConfig};
use crucible::metrics::{degradation_ratio, DegradationDetail};
use crucible::overfit::{OverfitConfig, OverfitDetector, SeverityLevel};
use crucible::types::{ParameterSet, PerformanceMetrics, Side, TradeRecord};

// ============================================================================
// Degradation Properties
// ============================================================================

proptest! {
    #[test]
    fn degradation_stays_in_unit_interval(
        train in 1e-6..100.0f64,
        holdout in -100.0..100.0f64,
    ) {
        let d = degradation_ratio(train, holdout);
        prop_assert!((0.0..=1.0).contains(&d));
    }

    #[test]
    fn degradation_is_zero_when_holdout_holds_up(
        train in 1e-6..100.0f64,
        surplus in 0.0..100.0f64,
    ) {
        // Holdout at or above training level never counts as degradation.
        let d = degradation_ratio(train, train + surplus);
        prop_assert_eq!(d, 0.0);
    }

    #[test]
    fn degradation_neutral_for_nonpositive_train(
        train in -100.0..=0.0f64,
        holdout in -100.0..100.0f64,
    ) {
        prop_assert_eq!(degradation_ratio(train, holdout), 0.0);
    }

    #[test]
    fn degradation_detail_average_is_mean_of_parts(
        t_sharpe in -5.0..5.0f64,
        t_ret in -100.0..100.0f64,
        t_win in 0.0..1.0f64,
        t_pf in 0.0..50.0f64,
        h_sharpe in -5.0..5.0f64,
        h_ret in -100.0..100.0f64,
        h_win in 0.0..1.0f64,
        h_pf in 0.0..50.0f64,
    ) {
        let train = PerformanceMetrics {
            sharpe_ratio: t_sharpe,
            total_return_pct: t_ret,
            win_rate: t_win,
            profit_factor: t_pf,
            ..Default::default()
        };
        let holdout = PerformanceMetrics {
            sharpe_ratio: h_sharpe,
            total_return_pct: h_ret,
            win_rate: h_win,
            profit_factor: h_pf,
            ..Default::default()
        };
        let detail = DegradationDetail::between(&train, &holdout);

        let expected =
            (detail.sharpe + detail.returns + detail.win_rate + detail.profit_factor) / 4.0;
        prop_assert!((detail.average - expected).abs() < 1e-12);
        for ratio in [detail.sharpe, detail.returns, detail.win_rate, detail.profit_factor] {
            prop_assert!((0.0..=1.0).contains(&ratio));
        }
    }
}

// ============================================================================
// Holdout Split Properties
// ============================================================================

proptest! {
    #[test]
    fn split_boundary_is_shared_and_fraction_exact(
        total_days in 200i64..3000,
        fraction in 0.1..0.5f64,
    ) {
        let config = HoldoutConfig {
            holdout_fraction: fraction,
            min_holdout_days: 1.0,
            ..Default::default()
        };
        let validator = HoldoutValidator::new(config);
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(total_days);

        let split = validator.create_split(start, end).unwrap();
        prop_assert_eq!(split.train_val.end, split.holdout.start);

        let total = split.train_val_days + split.holdout_days;
        prop_assert!((split.holdout_days / total - fraction).abs() < 1e-6);
    }

    #[test]
    fn split_fails_when_holdout_too_short(
        total_days in 10i64..200,
        fraction in 0.01..0.1f64,
    ) {
        // Force a minimum the implied holdout cannot reach.
        let config = HoldoutConfig {
            holdout_fraction: fraction,
            min_holdout_days: total_days as f64,
            ..Default::default()
        };
        let validator = HoldoutValidator::new(config);
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(total_days);

        prop_assert!(validator.create_split(start, end).is_err());
    }
}

// ============================================================================
// Score Clamping Properties
// ============================================================================

proptest! {
    #[test]
    fn confidence_score_stays_clamped(
        ret in -100.0..100.0f64,
        sharpe in -5.0..5.0f64,
        win in 0.0..1.0f64,
        trades in 0usize..500,
        avg_degradation in 0.0..1.0f64,
    ) {
        let holdout = PerformanceMetrics {
            total_return_pct: ret,
            sharpe_ratio: sharpe,
            win_rate: win,
            total_trades: trades,
            ..Default::default()
        };
        let degradation = DegradationDetail {
            sharpe: avg_degradation,
            returns: avg_degradation,
            win_rate: avg_degradation,
            profit_factor: avg_degradation,
            average: avg_degradation,
        };

        let assessment = ConfidenceAssessment::assess(&holdout, &degradation);
        prop_assert!((0.0..=1.0).contains(&assessment.score));

        // Level always agrees with the score bands.
        let expected = ConfidenceLevel::from_score(assessment.score);
        prop_assert_eq!(assessment.level, expected);
    }

    #[test]
    fn overfit_probability_stays_clamped(
        is_sharpe in -5.0..5.0f64,
        is_ret in -100.0..200.0f64,
        is_win in 0.0..1.0f64,
        is_pf in 0.0..50.0f64,
        oos_sharpe in -5.0..5.0f64,
        oos_ret in -100.0..200.0f64,
        oos_win in 0.0..1.0f64,
        oos_pf in 0.0..50.0f64,
        param_a in 0.1..100.0f64,
        param_b in 0.1..100.0f64,
    ) {
        let detector = OverfitDetector::new(OverfitConfig::default());
        let in_sample = PerformanceMetrics {
            sharpe_ratio: is_sharpe,
            total_return_pct: is_ret,
            win_rate: is_win,
            profit_factor: is_pf,
            avg_win: 100.0,
            avg_loss: -80.0,
            ..Default::default()
        };
        let out_of_sample = PerformanceMetrics {
            sharpe_ratio: oos_sharpe,
            total_return_pct: oos_ret,
            win_rate: oos_win,
            profit_factor: oos_pf,
            ..Default::default()
        };
        let history: Vec<ParameterSet> = vec![
            [("a".to_string(), param_a)].into_iter().collect(),
            [("a".to_string(), param_b)].into_iter().collect(),
        ];

        let analysis = detector.detect(&in_sample, &out_of_sample, &[], &[], &history);
        prop_assert!((0.0..=1.0).contains(&analysis.probability));
        prop_assert!((0.5..=1.0).contains(&analysis.confidence));

        let expected = SeverityLevel::from_probability(analysis.probability);
        prop_assert_eq!(analysis.severity, expected);
    }
}

// ============================================================================
// Seeded Reproducibility Properties
// ============================================================================

fn make_trades(pnls: &[f64]) -> Vec<TradeRecord> {
    pnls.iter()
        .enumerate()
        .map(|(i, &pnl_pct)| {
            let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::days(i as i64);
            TradeRecord {
                id: format!("t-{}", i),
                symbol: "TEST".to_string(),
                side: Side::Buy,
                entry_price: 100.0,
                entry_time: entry,
                exit_price: 100.0 + pnl_pct,
                exit_time: entry + chrono::Duration::hours(8),
                size: 1.0,
                pnl: pnl_pct * 10.0,
                pnl_pct,
                fees: 0.0,
                signal_tags: vec![if i % 2 == 0 { "alpha" } else { "beta" }.to_string()],
            }
        })
        .collect()
}

proptest! {
    // Permutation trials dominate runtime; keep the case count modest.
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn seeded_importance_is_reproducible(
        seed in any::<u64>(),
        pnls in prop::collection::vec(-5.0..5.0f64, 25..60),
    ) {
        let trades = make_trades(&pnls);
        let config = ImportanceConfig {
            num_permutations: 20,
            seed: Some(seed),
            ..Default::default()
        };

        let a = FeatureImportanceCalculator::new(config.clone())
            .calculate(&trades, &PerformanceMetrics::default())
            .unwrap();
        let b = FeatureImportanceCalculator::new(config)
            .calculate(&trades, &PerformanceMetrics::default())
            .unwrap();

        prop_assert_eq!(a.scores.len(), b.scores.len());
        for (x, y) in a.scores.iter().zip(b.scores.iter()) {
            prop_assert_eq!(&x.signal, &y.signal);
            prop_assert_eq!(x.importance.to_bits(), y.importance.to_bits());
            prop_assert_eq!(x.p_value.to_bits(), y.p_value.to_bits());
            prop_assert_eq!(x.mean_permuted.to_bits(), y.mean_permuted.to_bits());
        }
    }

    #[test]
    fn importance_p_values_are_fractions(
        seed in any::<u64>(),
        pnls in prop::collection::vec(-5.0..5.0f64, 25..40),
    ) {
        let trades = make_trades(&pnls);
        let config = ImportanceConfig {
            num_permutations: 10,
            seed: Some(seed),
            ..Default::default()
        };

        let result = FeatureImportanceCalculator::new(config)
            .calculate(&trades, &PerformanceMetrics::default())
            .unwrap();

        for score in &result.scores {
            prop_assert!((0.0..=1.0).contains(&score.p_value));
            let (lo, hi) = score.confidence_interval;
            prop_assert!(lo <= score.importance && score.importance <= hi);
        }
    }
}
