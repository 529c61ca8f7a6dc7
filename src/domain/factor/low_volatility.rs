//! Low-volatility factor: realized volatility, market beta and drawdown.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::{Curve, FactorConfig, FactorKind, FactorResult, ScoringContext, SubComponent};
use crate::domain::ohlcv::{OhlcvBar, daily_returns};
use crate::domain::security::SecurityInput;
use crate::domain::stats::{annualized_volatility, beta, max_drawdown};

/// Trailing window for all derived statistics.
pub const LOOKBACK_BARS: usize = 252;
pub const MIN_VOLATILITY_RETURNS: usize = 20;
pub const MIN_BETA_RETURNS: usize = 30;

/// Annualized volatility; calmer scores higher.
pub const VOLATILITY_CURVE: Curve = Curve(&[
    (0.00, 100.0),
    (0.10, 95.0),
    (0.15, 88.0),
    (0.20, 80.0),
    (0.25, 70.0),
    (0.30, 60.0),
    (0.40, 45.0),
    (0.50, 30.0),
    (0.70, 15.0),
    (1.00, 0.0),
]);

pub const BETA_CURVE: Curve = Curve(&[
    (0.0, 100.0),
    (0.5, 90.0),
    (0.8, 75.0),
    (1.0, 60.0),
    (1.2, 45.0),
    (1.5, 30.0),
    (2.0, 10.0),
    (3.0, 0.0),
]);

pub const DRAWDOWN_CURVE: Curve = Curve(&[
    (0.00, 100.0),
    (0.10, 85.0),
    (0.20, 65.0),
    (0.30, 45.0),
    (0.50, 20.0),
    (0.80, 0.0),
]);

#[derive(Debug, Clone, PartialEq)]
pub struct LowVolatilityWeights {
    pub volatility: f64,
    pub beta: f64,
    pub max_drawdown: f64,
}

impl Default for LowVolatilityWeights {
    fn default() -> Self {
        LowVolatilityWeights {
            volatility: 0.50,
            beta: 0.30,
            max_drawdown: 0.20,
        }
    }
}

impl LowVolatilityWeights {
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("volatility", self.volatility),
            ("beta", self.beta),
            ("max_drawdown", self.max_drawdown),
        ]
    }
}

pub fn compute_low_volatility(
    input: &SecurityInput,
    ctx: &ScoringContext,
    config: &FactorConfig,
) -> FactorResult {
    let w = &config.low_volatility;
    let window = trailing(&input.bars, LOOKBACK_BARS + 1);

    let derived_vol = || {
        let returns = daily_returns(window);
        if returns.len() >= MIN_VOLATILITY_RETURNS {
            annualized_volatility(&returns)
        } else {
            None
        }
    };
    let vol = match input.precomputed.volatility.or_else(derived_vol) {
        Some(v) => SubComponent::scored(
            "volatility",
            w.volatility,
            v,
            VOLATILITY_CURVE.eval(v),
            format!("annualized volatility {:.1}%", v * 100.0),
        ),
        None => SubComponent::unavailable("volatility", w.volatility, "volatility"),
    };

    let b = match input
        .precomputed
        .beta
        .or_else(|| beta_against(window, &ctx.benchmark))
    {
        Some(b) => SubComponent::scored(
            "beta",
            w.beta,
            b,
            BETA_CURVE.eval(b),
            format!("beta {b:.2}"),
        ),
        None => SubComponent::unavailable("beta", w.beta, "beta"),
    };

    let dd = if window.len() > MIN_VOLATILITY_RETURNS {
        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let dd = max_drawdown(&closes);
        SubComponent::scored(
            "max_drawdown",
            w.max_drawdown,
            dd,
            DRAWDOWN_CURVE.eval(dd),
            format!("max drawdown {:.1}%", dd * 100.0),
        )
    } else {
        SubComponent::unavailable("max_drawdown", w.max_drawdown, "drawdown history")
    };

    FactorResult::from_components(FactorKind::LowVolatility, vec![vol, b, dd])
}

fn trailing(bars: &[OhlcvBar], n: usize) -> &[OhlcvBar] {
    &bars[bars.len().saturating_sub(n)..]
}

/// Beta from returns over consecutive security bars whose dates both exist
/// in the benchmark history.
pub fn beta_against(bars: &[OhlcvBar], benchmark: &[OhlcvBar]) -> Option<f64> {
    if benchmark.is_empty() {
        return None;
    }
    let bench: HashMap<NaiveDate, f64> = benchmark.iter().map(|b| (b.date, b.close)).collect();
    let (asset, market): (Vec<f64>, Vec<f64>) = bars
        .windows(2)
        .filter_map(|w| {
            let b0 = *bench.get(&w[0].date)?;
            let b1 = *bench.get(&w[1].date)?;
            if b0 <= 0.0 {
                return None;
            }
            Some((w[1].return_since(w[0].close)?, b1 / b0 - 1.0))
        })
        .unzip();
    if asset.len() < MIN_BETA_RETURNS {
        return None;
    }
    beta(&asset, &market)
}
