//! Value factor: cash-flow, earnings and book yields against price.

use super::{Curve, FactorConfig, FactorKind, FactorResult, ScoringContext, SubComponent};
use crate::domain::security::SecurityInput;

pub const FCF_YIELD_CURVE: Curve = Curve(&[
    (-0.10, 0.0),
    (0.00, 15.0),
    (0.02, 30.0),
    (0.04, 50.0),
    (0.06, 65.0),
    (0.08, 80.0),
    (0.12, 100.0),
]);

pub const EARNINGS_YIELD_CURVE: Curve = Curve(&[
    (-0.10, 0.0),
    (0.00, 15.0),
    (0.02, 30.0),
    (0.04, 45.0),
    (0.06, 60.0),
    (0.08, 75.0),
    (0.10, 85.0),
    (0.15, 100.0),
]);

pub const BOOK_TO_PRICE_CURVE: Curve = Curve(&[
    (0.0, 10.0),
    (0.2, 25.0),
    (0.4, 45.0),
    (0.6, 60.0),
    (0.8, 75.0),
    (1.0, 85.0),
    (1.5, 100.0),
]);

pub const NEGATIVE_BOOK_SCORE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueWeights {
    pub fcf_yield: f64,
    pub earnings_yield: f64,
    pub book_to_price: f64,
}

impl Default for ValueWeights {
    fn default() -> Self {
        ValueWeights {
            fcf_yield: 0.40,
            earnings_yield: 0.35,
            book_to_price: 0.25,
        }
    }
}

impl ValueWeights {
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("fcf_yield", self.fcf_yield),
            ("earnings_yield", self.earnings_yield),
            ("book_to_price", self.book_to_price),
        ]
    }
}

pub fn compute_value(
    input: &SecurityInput,
    _ctx: &ScoringContext,
    config: &FactorConfig,
) -> FactorResult {
    let w = &config.value;
    let f = &input.fundamentals;
    let price = input.price().filter(|p| *p > 0.0);

    let fcf = match (f.free_cash_flow, f.market_cap) {
        (Some(fcf), Some(cap)) if cap > 0.0 => {
            let y = fcf / cap;
            SubComponent::scored(
                "fcf_yield",
                w.fcf_yield,
                y,
                FCF_YIELD_CURVE.eval(y),
                format!("free-cash-flow yield {:.1}%", y * 100.0),
            )
        }
        _ => SubComponent::unavailable("fcf_yield", w.fcf_yield, "free-cash-flow yield"),
    };

    let earnings = match (f.eps, price) {
        (Some(eps), Some(p)) => {
            let y = eps / p;
            SubComponent::scored(
                "earnings_yield",
                w.earnings_yield,
                y,
                EARNINGS_YIELD_CURVE.eval(y),
                format!("earnings yield {:.1}%", y * 100.0),
            )
        }
        _ => SubComponent::unavailable("earnings_yield", w.earnings_yield, "earnings yield"),
    };

    let book = match (f.book_value_per_share, price) {
        (Some(bv), Some(p)) if bv < 0.0 => SubComponent::scored(
            "book_to_price",
            w.book_to_price,
            bv / p,
            NEGATIVE_BOOK_SCORE,
            "negative book value".to_string(),
        ),
        (Some(bv), Some(p)) => {
            let ratio = bv / p;
            SubComponent::scored(
                "book_to_price",
                w.book_to_price,
                ratio,
                BOOK_TO_PRICE_CURVE.eval(ratio),
                format!("book/price {ratio:.2}"),
            )
        }
        _ => SubComponent::unavailable("book_to_price", w.book_to_price, "book/price"),
    };

    FactorResult::from_components(FactorKind::Value, vec![fcf, earnings, book])
}
