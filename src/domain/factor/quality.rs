//! Quality factor: profitability, returns on equity, leverage and margin
//! stability.

use super::{Curve, FactorConfig, FactorKind, FactorResult, ScoringContext, SubComponent};
use crate::domain::security::SecurityInput;
use crate::domain::stats::coefficient_of_variation;

/// Gross profit / total assets. >= 40% scores 90-100, 33-40% 75-90,
/// below 0% 0-15.
pub const GROSS_PROFITABILITY_CURVE: Curve = Curve(&[
    (-0.20, 0.0),
    (0.00, 15.0),
    (0.10, 35.0),
    (0.20, 55.0),
    (0.33, 75.0),
    (0.40, 90.0),
    (0.60, 100.0),
]);

pub const ROE_CURVE: Curve = Curve(&[
    (-0.20, 0.0),
    (0.00, 15.0),
    (0.05, 30.0),
    (0.10, 50.0),
    (0.15, 65.0),
    (0.20, 80.0),
    (0.30, 92.0),
    (0.50, 100.0),
]);

/// Lower leverage scores higher.
pub const DEBT_TO_EQUITY_CURVE: Curve = Curve(&[
    (0.0, 100.0),
    (0.3, 90.0),
    (0.5, 80.0),
    (1.0, 60.0),
    (1.5, 45.0),
    (2.0, 30.0),
    (3.0, 15.0),
    (5.0, 0.0),
]);

/// Coefficient of variation of the margin history; lower is more stable.
pub const MARGIN_STABILITY_CURVE: Curve = Curve(&[
    (0.00, 100.0),
    (0.05, 90.0),
    (0.10, 75.0),
    (0.20, 55.0),
    (0.35, 35.0),
    (0.50, 20.0),
    (1.00, 0.0),
]);

pub const NEGATIVE_EQUITY_SCORE: f64 = 10.0;
pub const MIN_MARGIN_PERIODS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct QualityWeights {
    pub gross_profitability: f64,
    pub roe: f64,
    pub debt_to_equity: f64,
    pub margin_stability: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        QualityWeights {
            gross_profitability: 0.35,
            roe: 0.25,
            debt_to_equity: 0.20,
            margin_stability: 0.20,
        }
    }
}

impl QualityWeights {
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("gross_profitability", self.gross_profitability),
            ("roe", self.roe),
            ("debt_to_equity", self.debt_to_equity),
            ("margin_stability", self.margin_stability),
        ]
    }
}

pub fn compute_quality(
    input: &SecurityInput,
    _ctx: &ScoringContext,
    config: &FactorConfig,
) -> FactorResult {
    let w = &config.quality;
    let f = &input.fundamentals;

    let gross_profitability = match (f.gross_profit, f.total_assets) {
        (Some(gp), Some(assets)) if assets > 0.0 => Some((gp / assets, "gross profit / assets")),
        _ => f.gross_margin.map(|m| (m, "gross margin")),
    };
    let gp = match gross_profitability {
        Some((ratio, basis)) => SubComponent::scored(
            "gross_profitability",
            w.gross_profitability,
            ratio,
            GROSS_PROFITABILITY_CURVE.eval(ratio),
            format!("{basis} {:.1}%", ratio * 100.0),
        ),
        None => SubComponent::unavailable("gross_profitability", w.gross_profitability, "gross profitability"),
    };

    let roe = match f.roe {
        Some(r) => SubComponent::scored(
            "roe",
            w.roe,
            r,
            ROE_CURVE.eval(r),
            format!("return on equity {:.1}%", r * 100.0),
        ),
        None => SubComponent::unavailable("roe", w.roe, "return on equity"),
    };

    let leverage = match f.debt_to_equity {
        Some(de) if de < 0.0 => SubComponent::scored(
            "debt_to_equity",
            w.debt_to_equity,
            de,
            NEGATIVE_EQUITY_SCORE,
            "negative shareholder equity".to_string(),
        ),
        Some(de) => SubComponent::scored(
            "debt_to_equity",
            w.debt_to_equity,
            de,
            DEBT_TO_EQUITY_CURVE.eval(de),
            format!("debt/equity {de:.2}"),
        ),
        None => SubComponent::unavailable("debt_to_equity", w.debt_to_equity, "debt/equity"),
    };

    let stability = score_margin_stability(&f.margin_history, w.margin_stability);

    FactorResult::from_components(FactorKind::Quality, vec![gp, roe, leverage, stability])
}

fn score_margin_stability(history: &[f64], weight: f64) -> SubComponent {
    if history.len() < MIN_MARGIN_PERIODS {
        return SubComponent::unavailable("margin_stability", weight, "margin history");
    }
    match coefficient_of_variation(history) {
        Some(cv) => SubComponent::scored(
            "margin_stability",
            weight,
            cv,
            MARGIN_STABILITY_CURVE.eval(cv),
            format!(
                "margin variation {:.1}% over {} periods",
                cv * 100.0,
                history.len()
            ),
        ),
        None => SubComponent::unavailable("margin_stability", weight, "non-zero margin history"),
    }
}
