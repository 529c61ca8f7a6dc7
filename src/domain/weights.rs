//! Factor weights by market regime and investment horizon.
//!
//! A regime selects a base row, the horizon adds a delta row, each weight is
//! clamped into `[min_weight, max_weight]` and the result is renormalized
//! when its sum drifts from 1.0 by more than `tolerance`.

use std::fmt;

use super::factor::FactorKind;
use super::regime::MarketRegime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Short, Horizon::Medium, Horizon::Long];

    pub fn index(self) -> usize {
        match self {
            Horizon::Short => 0,
            Horizon::Medium => 1,
            Horizon::Long => 2,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Horizon::Short => "short",
            Horizon::Medium => "medium",
            Horizon::Long => "long",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Horizon::Short => "Short",
            Horizon::Medium => "Medium",
            Horizon::Long => "Long",
        };
        write!(f, "{s}")
    }
}

/// Six factor weights in [`FactorKind::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorWeights(pub [f64; 6]);

impl FactorWeights {
    pub fn get(&self, kind: FactorKind) -> f64 {
        self.0[kind.index()]
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactorKind, f64)> + '_ {
        FactorKind::ALL.iter().map(|k| (*k, self.0[k.index()]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    /// Indexed by [`MarketRegime::index`].
    pub base: [[f64; 6]; 4],
    /// Indexed by [`Horizon::index`].
    pub horizon_deltas: [[f64; 6]; 3],
    pub min_weight: f64,
    pub max_weight: f64,
    pub tolerance: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        const SHORT: [f64; 6] = [-0.05, -0.05, 0.05, 0.0, 0.02, 0.03];
        WeightConfig {
            base: [
                [0.20, 0.10, 0.30, 0.05, 0.20, 0.15],
                [0.35, 0.25, 0.05, 0.20, 0.10, 0.05],
                [0.20, 0.20, 0.15, 0.15, 0.15, 0.15],
                [0.30, 0.10, 0.05, 0.35, 0.10, 0.10],
            ],
            horizon_deltas: [SHORT, [0.0; 6], SHORT.map(|d| -d)],
            min_weight: 0.02,
            max_weight: 0.50,
            tolerance: 0.01,
        }
    }
}

impl WeightConfig {
    pub fn base_weight(&self, regime: MarketRegime, kind: FactorKind) -> f64 {
        self.base[regime.index()][kind.index()]
    }

    pub fn delta(&self, horizon: Horizon, kind: FactorKind) -> f64 {
        self.horizon_deltas[horizon.index()][kind.index()]
    }
}

pub fn resolve_weights(regime: MarketRegime, horizon: Horizon, config: &WeightConfig) -> FactorWeights {
    let base = config.base[regime.index()];
    let delta = config.horizon_deltas[horizon.index()];
    let mut w = [0.0; 6];
    for i in 0..6 {
        w[i] = (base[i] + delta[i]).clamp(config.min_weight, config.max_weight);
    }
    let sum: f64 = w.iter().sum();
    if sum > 0.0 && (sum - 1.0).abs() > config.tolerance {
        for v in w.iter_mut() {
            *v /= sum;
        }
    }
    FactorWeights(w)
}
