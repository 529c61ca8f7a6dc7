//! Momentum factor: 12-1 month return, 6-month return and up-volume share.
//!
//! Precomputed returns win over values derived from the bar series. Derived
//! values use trading-day offsets: 252 bars for twelve months, 126 for six,
//! 21 for the skipped most recent month.

use super::{Curve, FactorConfig, FactorKind, FactorResult, ScoringContext, SubComponent};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::security::SecurityInput;

pub const TWELVE_MONTH_BARS: usize = 252;
pub const SIX_MONTH_BARS: usize = 126;
pub const SKIP_MONTH_BARS: usize = 21;
/// Shortest history the 12-1 return is derived from; shorter lookbacks are
/// accepted down to six months plus the skipped month.
pub const MIN_12_1_BARS: usize = SIX_MONTH_BARS + SKIP_MONTH_BARS + 1;
pub const UP_VOLUME_BARS: usize = 50;

pub const MOMENTUM_12_1_CURVE: Curve = Curve(&[
    (-0.50, 0.0),
    (-0.20, 15.0),
    (0.00, 35.0),
    (0.10, 50.0),
    (0.20, 65.0),
    (0.35, 80.0),
    (0.50, 90.0),
    (1.00, 100.0),
]);

pub const RETURN_6M_CURVE: Curve = Curve(&[
    (-0.30, 0.0),
    (-0.10, 20.0),
    (0.00, 40.0),
    (0.05, 50.0),
    (0.15, 70.0),
    (0.30, 88.0),
    (0.60, 100.0),
]);

/// Share of volume traded on up days.
pub const UP_VOLUME_CURVE: Curve = Curve(&[
    (0.20, 0.0),
    (0.35, 20.0),
    (0.50, 50.0),
    (0.65, 80.0),
    (0.80, 100.0),
]);

#[derive(Debug, Clone, PartialEq)]
pub struct MomentumWeights {
    pub momentum_12_1: f64,
    pub return_6m: f64,
    pub up_volume: f64,
}

impl Default for MomentumWeights {
    fn default() -> Self {
        MomentumWeights {
            momentum_12_1: 0.50,
            return_6m: 0.25,
            up_volume: 0.25,
        }
    }
}

impl MomentumWeights {
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("momentum_12_1", self.momentum_12_1),
            ("return_6m", self.return_6m),
            ("up_volume", self.up_volume),
        ]
    }
}

pub fn compute_momentum(
    input: &SecurityInput,
    _ctx: &ScoringContext,
    config: &FactorConfig,
) -> FactorResult {
    let w = &config.momentum;
    let bars = &input.bars;

    let m12 = match input.precomputed.momentum_12_1.or_else(|| momentum_12_1(bars)) {
        Some(r) => SubComponent::scored(
            "momentum_12_1",
            w.momentum_12_1,
            r,
            MOMENTUM_12_1_CURVE.eval(r),
            format!("12-1 month return {:+.1}%", r * 100.0),
        ),
        None => SubComponent::unavailable("momentum_12_1", w.momentum_12_1, "12-1 month return"),
    };

    let m6 = match input.precomputed.return_6m.or_else(|| return_6m(bars)) {
        Some(r) => SubComponent::scored(
            "return_6m",
            w.return_6m,
            r,
            RETURN_6M_CURVE.eval(r),
            format!("6 month return {:+.1}%", r * 100.0),
        ),
        None => SubComponent::unavailable("return_6m", w.return_6m, "6 month return"),
    };

    let up = match up_volume_ratio(bars) {
        Some(ratio) => SubComponent::scored(
            "up_volume",
            w.up_volume,
            ratio,
            UP_VOLUME_CURVE.eval(ratio),
            format!(
                "{:.0}% of volume on up days over {UP_VOLUME_BARS} bars",
                ratio * 100.0
            ),
        ),
        None => SubComponent::unavailable("up_volume", w.up_volume, "volume history"),
    };

    FactorResult::from_components(FactorKind::Momentum, vec![m12, m6, up])
}

/// Return from twelve months ago (or the earliest bar, if at least
/// [`MIN_12_1_BARS`] exist) to one month ago.
pub fn momentum_12_1(bars: &[OhlcvBar]) -> Option<f64> {
    if bars.len() < MIN_12_1_BARS {
        return None;
    }
    let last = bars.len() - 1;
    let end = last - SKIP_MONTH_BARS;
    let start = last - TWELVE_MONTH_BARS.min(last);
    bars[end].return_since(bars[start].close)
}

pub fn return_6m(bars: &[OhlcvBar]) -> Option<f64> {
    if bars.len() <= SIX_MONTH_BARS {
        return None;
    }
    let last = bars.len() - 1;
    bars[last].return_since(bars[last - SIX_MONTH_BARS].close)
}

/// Volume on bars closing above the prior close, over total volume, for the
/// trailing window.
pub fn up_volume_ratio(bars: &[OhlcvBar]) -> Option<f64> {
    if bars.len() <= UP_VOLUME_BARS {
        return None;
    }
    let window = &bars[bars.len() - UP_VOLUME_BARS - 1..];
    let (up, total) = window.windows(2).fold((0.0, 0.0), |(up, total), w| {
        let v = w[1].volume.max(0) as f64;
        if w[1].close > w[0].close {
            (up + v, total + v)
        } else {
            (up, total + v)
        }
    });
    if total > 0.0 { Some(up / total) } else { None }
}
