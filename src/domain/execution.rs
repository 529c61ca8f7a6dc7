//! Fill simulation: directional slippage and percentage commission.
//!
//! Buys pay up, sells receive down. All percentages are in percent units,
//! so `0.05` means five basis points.

use super::position::Direction;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

/// Commission on `trade_value`: `trade_value * pct / 100`.
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value * config.commission_pct / 100.0
}

/// Long entry (buy): `market_price * (1 + slippage_pct / 100)`.
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Short entry (sell short): `market_price * (1 - slippage_pct / 100)`.
pub fn apply_slippage_short_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Long exit (sell): `market_price * (1 - slippage_pct / 100)`.
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Short exit (buy to cover): `market_price * (1 + slippage_pct / 100)`.
pub fn apply_slippage_short_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

pub fn entry_fill(direction: Direction, market_price: f64, config: &ExecutionConfig) -> f64 {
    match direction {
        Direction::Long => apply_slippage_long_entry(market_price, config.slippage_pct),
        Direction::Short => apply_slippage_short_entry(market_price, config.slippage_pct),
    }
}

pub fn exit_fill(direction: Direction, market_price: f64, config: &ExecutionConfig) -> f64 {
    match direction {
        Direction::Long => apply_slippage_long_exit(market_price, config.slippage_pct),
        Direction::Short => apply_slippage_short_exit(market_price, config.slippage_pct),
    }
}

/// Cost of one leg as a fraction of the notional traded.
pub fn leg_cost_fraction(config: &ExecutionConfig) -> f64 {
    (config.slippage_pct + config.commission_pct) / 100.0
}

/// Round-trip cost as a fraction of entry notional: the return lost to
/// slippage between market and fill prices, plus commission on both legs.
pub fn round_trip_cost(
    direction: Direction,
    entry_price: f64,
    exit_price: f64,
    config: &ExecutionConfig,
) -> f64 {
    if entry_price <= 0.0 {
        return 0.0;
    }
    let entry = entry_fill(direction, entry_price, config);
    let exit = exit_fill(direction, exit_price, config);
    let market = direction.price_return(entry_price, exit_price);
    let filled = direction.price_return(entry, exit);
    let commission =
        (calculate_commission(entry, config) + calculate_commission(exit, config)) / entry;
    (market - filled) + commission
}
