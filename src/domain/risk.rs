//! Sequential risk gate applied to every scored security.
//!
//! Checks run in a fixed order and stop at the first failure, which becomes
//! the reported reason. A check whose input is unknown passes.

use std::fmt;

use super::security::SecurityInput;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskFilterConfig {
    pub min_conviction: u8,
    pub min_price: f64,
    pub min_market_cap: f64,
    pub min_avg_dollar_volume: f64,
    pub max_days_to_cover: f64,
    pub max_debt_to_equity: f64,
    pub min_current_ratio: f64,
}

impl Default for RiskFilterConfig {
    fn default() -> Self {
        RiskFilterConfig {
            min_conviction: 4,
            min_price: 5.0,
            min_market_cap: 300_000_000.0,
            min_avg_dollar_volume: 1_000_000.0,
            max_days_to_cover: 10.0,
            max_debt_to_equity: 3.0,
            min_current_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterReason {
    LowConviction { conviction: u8, minimum: u8 },
    PennyStock { price: f64, minimum: f64 },
    SmallCap { market_cap: f64, minimum: f64 },
    Illiquid { avg_dollar_volume: f64, minimum: f64 },
    ShortSqueezeRisk { days_to_cover: f64, maximum: f64 },
    ExcessiveLeverage { debt_to_equity: f64, maximum: f64 },
    WeakLiquidity { current_ratio: f64, minimum: f64 },
}

impl FilterReason {
    pub fn code(&self) -> &'static str {
        match self {
            FilterReason::LowConviction { .. } => "low-conviction",
            FilterReason::PennyStock { .. } => "penny-stock",
            FilterReason::SmallCap { .. } => "small-cap",
            FilterReason::Illiquid { .. } => "illiquid",
            FilterReason::ShortSqueezeRisk { .. } => "short-squeeze-risk",
            FilterReason::ExcessiveLeverage { .. } => "excessive-leverage",
            FilterReason::WeakLiquidity { .. } => "weak-liquidity",
        }
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::LowConviction { conviction, minimum } => {
                write!(f, "low-conviction: {conviction} < {minimum}")
            }
            FilterReason::PennyStock { price, minimum } => {
                write!(f, "penny-stock: price {price:.2} < {minimum:.2}")
            }
            FilterReason::SmallCap { market_cap, minimum } => {
                write!(f, "small-cap: market cap {market_cap:.0} < {minimum:.0}")
            }
            FilterReason::Illiquid {
                avg_dollar_volume,
                minimum,
            } => write!(
                f,
                "illiquid: average dollar volume {avg_dollar_volume:.0} < {minimum:.0}"
            ),
            FilterReason::ShortSqueezeRisk {
                days_to_cover,
                maximum,
            } => write!(
                f,
                "short-squeeze-risk: days to cover {days_to_cover:.1} > {maximum:.1}"
            ),
            FilterReason::ExcessiveLeverage {
                debt_to_equity,
                maximum,
            } => write!(
                f,
                "excessive-leverage: debt/equity {debt_to_equity:.2} > {maximum:.2}"
            ),
            FilterReason::WeakLiquidity {
                current_ratio,
                minimum,
            } => write!(
                f,
                "weak-liquidity: current ratio {current_ratio:.2} < {minimum:.2}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskVerdict {
    Pass,
    Fail(FilterReason),
}

impl RiskVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, RiskVerdict::Pass)
    }

    pub fn reason(&self) -> Option<&FilterReason> {
        match self {
            RiskVerdict::Pass => None,
            RiskVerdict::Fail(reason) => Some(reason),
        }
    }
}

pub fn apply_risk_filter(
    input: &SecurityInput,
    conviction: u8,
    config: &RiskFilterConfig,
) -> RiskVerdict {
    match first_failure(input, conviction, config) {
        Some(reason) => RiskVerdict::Fail(reason),
        None => RiskVerdict::Pass,
    }
}

fn first_failure(
    input: &SecurityInput,
    conviction: u8,
    config: &RiskFilterConfig,
) -> Option<FilterReason> {
    let f = &input.fundamentals;

    if conviction < config.min_conviction {
        return Some(FilterReason::LowConviction {
            conviction,
            minimum: config.min_conviction,
        });
    }
    if let Some(price) = input.price().filter(|p| *p < config.min_price) {
        return Some(FilterReason::PennyStock {
            price,
            minimum: config.min_price,
        });
    }
    if let Some(market_cap) = f.market_cap.filter(|m| *m < config.min_market_cap) {
        return Some(FilterReason::SmallCap {
            market_cap,
            minimum: config.min_market_cap,
        });
    }
    if let Some(adv) = input
        .avg_dollar_volume()
        .filter(|v| *v < config.min_avg_dollar_volume)
    {
        return Some(FilterReason::Illiquid {
            avg_dollar_volume: adv,
            minimum: config.min_avg_dollar_volume,
        });
    }
    if let Some(dtc) = f.days_to_cover.filter(|d| *d > config.max_days_to_cover) {
        return Some(FilterReason::ShortSqueezeRisk {
            days_to_cover: dtc,
            maximum: config.max_days_to_cover,
        });
    }
    if let Some(de) = f.debt_to_equity.filter(|d| *d > config.max_debt_to_equity) {
        return Some(FilterReason::ExcessiveLeverage {
            debt_to_equity: de,
            maximum: config.max_debt_to_equity,
        });
    }
    if let Some(cr) = f.current_ratio.filter(|c| *c < config.min_current_ratio) {
        return Some(FilterReason::WeakLiquidity {
            current_ratio: cr,
            minimum: config.min_current_ratio,
        });
    }
    None
}
