//! Factor modules.
//!
//! Six independent, pure scorers share one contract,
//! `fn(&SecurityInput, &ScoringContext, &FactorConfig) -> FactorResult`, and
//! are dispatched through the fixed [`FACTOR_TABLE`]. Each factor is a weighted
//! blend of two to four sub-components; a sub-component without data is
//! scored neutral (50) and does not count towards completeness.

pub mod catalyst;
pub mod low_volatility;
pub mod momentum;
pub mod quality;
pub mod smart_money;
pub mod value;

use std::collections::HashMap;
use std::fmt;

use super::ohlcv::OhlcvBar;
use super::regime::RegimeContext;
use super::security::SecurityInput;

pub use catalyst::{CatalystConfig, SectorRotationTable};
pub use low_volatility::LowVolatilityWeights;
pub use momentum::MomentumWeights;
pub use quality::QualityWeights;
pub use smart_money::SmartMoneyConfig;
pub use value::ValueWeights;

pub const NEUTRAL_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactorKind {
    Quality,
    Value,
    Momentum,
    LowVolatility,
    SmartMoney,
    Catalyst,
}

impl FactorKind {
    pub const ALL: [FactorKind; 6] = [
        FactorKind::Quality,
        FactorKind::Value,
        FactorKind::Momentum,
        FactorKind::LowVolatility,
        FactorKind::SmartMoney,
        FactorKind::Catalyst,
    ];

    pub fn index(self) -> usize {
        match self {
            FactorKind::Quality => 0,
            FactorKind::Value => 1,
            FactorKind::Momentum => 2,
            FactorKind::LowVolatility => 3,
            FactorKind::SmartMoney => 4,
            FactorKind::Catalyst => 5,
        }
    }

    /// Config key fragment, e.g. `low_volatility`.
    pub fn key(self) -> &'static str {
        match self {
            FactorKind::Quality => "quality",
            FactorKind::Value => "value",
            FactorKind::Momentum => "momentum",
            FactorKind::LowVolatility => "low_volatility",
            FactorKind::SmartMoney => "smart_money",
            FactorKind::Catalyst => "catalyst",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FactorKind::Quality => "Quality",
            FactorKind::Value => "Value",
            FactorKind::Momentum => "Momentum",
            FactorKind::LowVolatility => "Low Volatility",
            FactorKind::SmartMoney => "Smart Money",
            FactorKind::Catalyst => "Catalyst",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubComponent {
    pub name: &'static str,
    pub score: f64,
    pub weight: f64,
    pub raw_value: Option<f64>,
    pub description: String,
}

impl SubComponent {
    pub fn scored(name: &'static str, weight: f64, raw: f64, score: f64, description: String) -> Self {
        SubComponent {
            name,
            score: score.clamp(0.0, 100.0),
            weight,
            raw_value: Some(raw),
            description,
        }
    }

    pub fn unavailable(name: &'static str, weight: f64, what: &str) -> Self {
        SubComponent {
            name,
            score: NEUTRAL_SCORE,
            weight,
            raw_value: None,
            description: format!("{what} unavailable"),
        }
    }

    pub fn has_data(&self) -> bool {
        self.raw_value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorResult {
    pub kind: FactorKind,
    pub score: f64,
    pub components: Vec<SubComponent>,
    pub completeness: f64,
}

impl FactorResult {
    pub fn from_components(kind: FactorKind, components: Vec<SubComponent>) -> Self {
        let total_weight: f64 = components.iter().map(|c| c.weight).sum();
        let score = if total_weight > 0.0 {
            components.iter().map(|c| c.score * c.weight).sum::<f64>() / total_weight
        } else {
            NEUTRAL_SCORE
        };
        let completeness = if components.is_empty() {
            0.0
        } else {
            components.iter().filter(|c| c.has_data()).count() as f64 / components.len() as f64
        };
        FactorResult {
            kind,
            score: score.clamp(0.0, 100.0),
            components,
            completeness,
        }
    }

    pub fn component(&self, name: &str) -> Option<&SubComponent> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Strictly monotonic piecewise-linear map from a raw ratio to a 0-100 score.
///
/// Breakpoints are `(x, score)` pairs in ascending `x`; inputs outside the
/// first/last breakpoint saturate at the end scores.
#[derive(Debug, Clone, Copy)]
pub struct Curve(pub &'static [(f64, f64)]);

impl Curve {
    pub fn eval(&self, x: f64) -> f64 {
        let points = self.0;
        let (first, last) = match (points.first(), points.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return NEUTRAL_SCORE,
        };
        if x.is_nan() {
            return NEUTRAL_SCORE;
        }
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        for w in points.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if x <= x1 {
                return y0 + (x - x0) / (x1 - x0) * (y1 - y0);
            }
        }
        last.1
    }
}

/// Batch-wide market data shared read-only by every security in a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringContext {
    pub regime: RegimeContext,
    /// Benchmark history up to the as-of date, oldest first.
    pub benchmark: Vec<OhlcvBar>,
    /// Sector return minus benchmark return over a recent window, keyed by
    /// normalized sector name.
    pub sector_momentum: HashMap<String, f64>,
}

impl ScoringContext {
    pub fn new(regime: RegimeContext) -> Self {
        ScoringContext {
            regime,
            benchmark: Vec::new(),
            sector_momentum: HashMap::new(),
        }
    }

    pub fn with_benchmark(mut self, bars: Vec<OhlcvBar>) -> Self {
        self.benchmark = bars;
        self
    }

    pub fn with_sector_momentum(mut self, sector: &str, relative_return: f64) -> Self {
        self.sector_momentum
            .insert(catalyst::normalize_sector(sector), relative_return);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactorConfig {
    pub quality: QualityWeights,
    pub value: ValueWeights,
    pub momentum: MomentumWeights,
    pub low_volatility: LowVolatilityWeights,
    pub smart_money: SmartMoneyConfig,
    pub catalyst: CatalystConfig,
}

impl FactorConfig {
    /// In-factor sub-weights as `(factor, [(component, weight)])`, for
    /// validation and config loading.
    pub fn sub_weights(&self) -> Vec<(FactorKind, Vec<(&'static str, f64)>)> {
        vec![
            (FactorKind::Quality, self.quality.entries()),
            (FactorKind::Value, self.value.entries()),
            (FactorKind::Momentum, self.momentum.entries()),
            (FactorKind::LowVolatility, self.low_volatility.entries()),
            (FactorKind::SmartMoney, self.smart_money.weights.entries()),
            (FactorKind::Catalyst, self.catalyst.weights.entries()),
        ]
    }
}

pub type FactorFn = fn(&SecurityInput, &ScoringContext, &FactorConfig) -> FactorResult;

pub const FACTOR_TABLE: [(FactorKind, FactorFn); 6] = [
    (FactorKind::Quality, quality::compute_quality),
    (FactorKind::Value, value::compute_value),
    (FactorKind::Momentum, momentum::compute_momentum),
    (FactorKind::LowVolatility, low_volatility::compute_low_volatility),
    (FactorKind::SmartMoney, smart_money::compute_smart_money),
    (FactorKind::Catalyst, catalyst::compute_catalyst),
];

/// Run every factor module, in [`FactorKind::ALL`] order.
pub fn compute_all(
    input: &SecurityInput,
    ctx: &ScoringContext,
    config: &FactorConfig,
) -> [FactorResult; 6] {
    FACTOR_TABLE.map(|(_, compute)| compute(input, ctx, config))
}
