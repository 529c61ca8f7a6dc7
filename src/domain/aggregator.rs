//! Composite scoring: runs the factor table, classifies the horizon, weights
//! by regime and horizon, spreads the composite, then gates and sizes.

use std::cmp::Ordering;

use tracing::{debug, info};

use super::config::EngineConfig;
use super::factor::catalyst::has_near_term_catalyst;
use super::factor::{FactorKind, FactorResult, ScoringContext, compute_all};
use super::parallel::map_slice;
use super::regime::MarketRegime;
use super::risk::{RiskVerdict, apply_risk_filter};
use super::security::SecurityInput;
use super::sizing::{PositionSizeResult, compute_position_size};
use super::weights::{FactorWeights, Horizon, resolve_weights};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Points away from 50 are raised to `1 / differentiation_exponent`.
    pub differentiation_exponent: f64,
    /// Score batches on the calling thread even with the `parallel` feature.
    pub force_sequential: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            differentiation_exponent: 1.8,
            force_sequential: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedScore {
    pub ticker: String,
    pub sector: Option<String>,
    /// Weighted composite before differentiation.
    pub raw_score: f64,
    /// Differentiated composite, 0-100.
    pub score: f64,
    pub conviction: u8,
    pub horizon: Horizon,
    pub regime: MarketRegime,
    pub factors: [FactorResult; 6],
    pub weights: FactorWeights,
    /// `factor score * weight`, in [`FactorKind::ALL`] order.
    pub contributions: [f64; 6],
    /// Fraction of the portfolio; zero whenever the risk filter failed.
    pub position_size: f64,
    pub sizing: Option<PositionSizeResult>,
    pub risk: RiskVerdict,
    pub completeness: f64,
}

impl EnhancedScore {
    pub fn passes_filters(&self) -> bool {
        self.risk.passed()
    }

    pub fn factor_score(&self, kind: FactorKind) -> f64 {
        self.factors[kind.index()].score
    }

    pub fn contribution(&self, kind: FactorKind) -> f64 {
        self.contributions[kind.index()]
    }
}

/// `50 + sign(d) * 50 * (|d| / 50)^(1/exponent)` with `d = score - 50`.
pub fn differentiate(score: f64, exponent: f64) -> f64 {
    let d = score.clamp(0.0, 100.0) - 50.0;
    if d == 0.0 || exponent <= 0.0 {
        return 50.0 + d;
    }
    let spread = 50.0 * (d.abs() / 50.0).powf(1.0 / exponent);
    (50.0 + d.signum() * spread).clamp(0.0, 100.0)
}

pub fn conviction(score: f64) -> u8 {
    (score / 10.0).round().clamp(1.0, 10.0) as u8
}

/// Holding horizon implied by the shape of the factor scores.
pub fn classify_horizon(factors: &[FactorResult; 6], near_term_catalyst: bool) -> Horizon {
    let score = |kind: FactorKind| factors[kind.index()].score;
    let quality = score(FactorKind::Quality);
    let value = score(FactorKind::Value);
    let momentum = score(FactorKind::Momentum);
    let smart_money = score(FactorKind::SmartMoney);

    if (near_term_catalyst && momentum >= 60.0)
        || (momentum >= 75.0 && smart_money >= 65.0)
        || momentum >= 80.0
    {
        Horizon::Short
    } else if (quality >= 70.0 && value >= 60.0 && momentum < 60.0)
        || (quality >= 75.0 && value >= 55.0)
    {
        Horizon::Long
    } else {
        Horizon::Medium
    }
}

pub fn score_security(input: &SecurityInput, ctx: &ScoringContext, config: &EngineConfig) -> EnhancedScore {
    let factors = compute_all(input, ctx, &config.factors);
    let near_term = has_near_term_catalyst(input, &config.factors.catalyst);
    let horizon = classify_horizon(&factors, near_term);
    let regime = ctx.regime.regime;
    let weights = resolve_weights(regime, horizon, &config.weights);

    let mut contributions = [0.0; 6];
    for (i, factor) in factors.iter().enumerate() {
        contributions[i] = factor.score * weights.0[i];
    }
    let raw_score = contributions.iter().sum::<f64>().clamp(0.0, 100.0);
    let score = differentiate(raw_score, config.scoring.differentiation_exponent);
    let conviction = conviction(score);

    let risk = apply_risk_filter(input, conviction, &config.risk);
    let (position_size, sizing) = if risk.passed() {
        let sizing = compute_position_size(&input.ticker, conviction, &config.sizing);
        (sizing.final_fraction, Some(sizing))
    } else {
        (0.0, None)
    };

    let completeness = factors.iter().map(|f| f.completeness).sum::<f64>() / factors.len() as f64;

    if let Some(reason) = risk.reason() {
        debug!(ticker = %input.ticker, score, %reason, "filtered");
    }

    EnhancedScore {
        ticker: input.ticker.clone(),
        sector: input.sector.clone(),
        raw_score,
        score,
        conviction,
        horizon,
        regime,
        factors,
        weights,
        contributions,
        position_size,
        sizing,
        risk,
        completeness,
    }
}

/// Higher score first; equal scores by ticker.
pub fn rank_order(a: &EnhancedScore, b: &EnhancedScore) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.ticker.cmp(&b.ticker))
}

/// Score every input against one shared context and rank the results.
pub fn score_batch(inputs: &[SecurityInput], ctx: &ScoringContext, config: &EngineConfig) -> Vec<EnhancedScore> {
    let mut scores = map_slice(
        inputs,
        |input| score_security(input, ctx, config),
        config.scoring.force_sequential,
    );
    scores.sort_by(rank_order);

    let passed = scores.iter().filter(|s| s.passes_filters()).count();
    info!(
        securities = scores.len(),
        passed,
        regime = %ctx.regime.regime,
        "scored batch"
    );
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::factor::SubComponent;
    use crate::domain::regime::{RegimeConfig, RegimeContext, RegimeInputs, detect_regime};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn factors_with(scores: [f64; 6]) -> [FactorResult; 6] {
        FactorKind::ALL.map(|kind| {
            FactorResult::from_components(
                kind,
                vec![SubComponent::scored("x", 1.0, 0.0, scores[kind.index()], String::new())],
            )
        })
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn strong_input(ticker: &str) -> SecurityInput {
        let mut s = SecurityInput::new(ticker, as_of());
        let f = &mut s.fundamentals;
        f.price = Some(40.0);
        f.market_cap = Some(20e9);
        f.avg_volume = Some(2e6);
        f.eps = Some(4.0);
        f.book_value_per_share = Some(36.0);
        f.free_cash_flow = Some(2.4e9);
        f.gross_margin = Some(0.45);
        f.roe = Some(0.30);
        f.debt_to_equity = Some(0.2);
        f.current_ratio = Some(2.0);
        f.margin_history = vec![0.44, 0.45, 0.45, 0.46];
        s.precomputed.momentum_12_1 = Some(0.30);
        s.precomputed.return_6m = Some(0.12);
        s.precomputed.volatility = Some(0.15);
        s.precomputed.beta = Some(0.7);
        s
    }

    fn bull() -> ScoringContext {
        ScoringContext::new(detect_regime(
            &RegimeInputs {
                benchmark_price: Some(500.0),
                benchmark_average: Some(480.0),
                volatility_index: Some(15.0),
            },
            &RegimeConfig::default(),
        ))
    }

    #[test]
    fn differentiation_spreads_scores() {
        assert_relative_eq!(differentiate(50.0, 1.8), 50.0);
        assert_relative_eq!(differentiate(100.0, 1.8), 100.0);
        assert_relative_eq!(differentiate(0.0, 1.8), 0.0);
        assert!(differentiate(60.0, 1.8) > 60.0);
        assert!(differentiate(40.0, 1.8) < 40.0);
        assert_relative_eq!(differentiate(60.0, 1.0), 60.0, epsilon = 1e-12);
    }

    #[test]
    fn conviction_bounds() {
        assert_eq!(conviction(0.0), 1);
        assert_eq!(conviction(44.0), 4);
        assert_eq!(conviction(45.0), 5);
        assert_eq!(conviction(100.0), 10);
    }

    #[test]
    fn horizon_rules() {
        assert_eq!(classify_horizon(&factors_with([50.0, 50.0, 85.0, 50.0, 50.0, 50.0]), false), Horizon::Short);
        assert_eq!(classify_horizon(&factors_with([50.0, 50.0, 76.0, 50.0, 70.0, 50.0]), false), Horizon::Short);
        assert_eq!(classify_horizon(&factors_with([50.0, 50.0, 62.0, 50.0, 50.0, 50.0]), true), Horizon::Short);
        assert_eq!(classify_horizon(&factors_with([50.0, 50.0, 62.0, 50.0, 50.0, 50.0]), false), Horizon::Medium);
        assert_eq!(classify_horizon(&factors_with([72.0, 62.0, 50.0, 50.0, 50.0, 50.0]), false), Horizon::Long);
        assert_eq!(classify_horizon(&factors_with([78.0, 56.0, 70.0, 50.0, 50.0, 50.0]), false), Horizon::Long);
        assert_eq!(classify_horizon(&factors_with([72.0, 62.0, 65.0, 50.0, 50.0, 50.0]), false), Horizon::Medium);
    }

    #[test]
    fn strong_security_is_sized() {
        let score = score_security(&strong_input("GOOD"), &bull(), &EngineConfig::default());
        assert!(score.passes_filters(), "{:?}", score.risk);
        assert!(score.position_size > 0.0);
        assert!(score.position_size <= EngineConfig::default().sizing.max_position);
        assert!(score.score > score.raw_score);
        assert_eq!(score.regime, MarketRegime::Bull);
        let sum: f64 = score.contributions.iter().sum();
        assert_relative_eq!(sum, score.raw_score, epsilon = 1e-9);
    }

    #[test]
    fn filtered_security_has_zero_size() {
        let mut input = strong_input("PENNY");
        input.fundamentals.price = Some(3.0);
        let score = score_security(&input, &bull(), &EngineConfig::default());
        assert!(!score.passes_filters());
        assert_eq!(score.risk.reason().map(|r| r.code()), Some("penny-stock"));
        assert_relative_eq!(score.position_size, 0.0);
        assert!(score.sizing.is_none());
    }

    #[test]
    fn empty_input_is_neutral() {
        let input = SecurityInput::new("EMPTY", as_of());
        let score = score_security(&input, &ScoringContext::new(RegimeContext::neutral()), &EngineConfig::default());
        assert_relative_eq!(score.completeness, 0.0);
        assert_relative_eq!(score.score, 50.0, epsilon = 1e-6);
        assert_eq!(score.conviction, 5);
        assert_eq!(score.horizon, Horizon::Medium);
    }

    #[test]
    fn batch_is_ranked_and_deterministic() {
        let mut weak = strong_input("WEAK");
        weak.precomputed.momentum_12_1 = Some(-0.3);
        weak.fundamentals.roe = Some(-0.1);
        let inputs = vec![weak, strong_input("BBB"), strong_input("AAA")];
        let config = EngineConfig::default();
        let first = score_batch(&inputs, &bull(), &config);
        let second = score_batch(&inputs, &bull(), &config);
        assert_eq!(first, second);
        let tickers: Vec<&str> = first.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAA", "BBB", "WEAK"]);
    }

    proptest! {
        #[test]
        fn differentiate_stays_in_range(score in 0.0f64..=100.0, exponent in 1.0f64..4.0) {
            let d = differentiate(score, exponent);
            prop_assert!((0.0..=100.0).contains(&d));
        }

        #[test]
        fn differentiate_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(differentiate(lo, 1.8) <= differentiate(hi, 1.8));
        }

        #[test]
        fn conviction_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(conviction(lo) <= conviction(hi));
            prop_assert!((1..=10).contains(&conviction(lo)));
        }

        #[test]
        fn filter_failure_means_zero_size(price in 0.5f64..20.0, roe in -0.5f64..0.6) {
            let mut input = strong_input("PROP");
            input.fundamentals.price = Some(price);
            input.fundamentals.roe = Some(roe);
            let score = score_security(&input, &bull(), &EngineConfig::default());
            if !score.passes_filters() {
                prop_assert_eq!(score.position_size, 0.0);
            }
            prop_assert!(score.position_size <= 0.08);
            for f in &score.factors {
                prop_assert!((0.0..=100.0).contains(&f.score));
            }
        }
    }
}
