//! Fractional-Kelly position sizing scaled by conviction.

#[derive(Debug, Clone, PartialEq)]
pub struct SizingConfig {
    /// Assumed probability that a pick wins.
    pub win_rate: f64,
    /// Average winning and losing trade return, both positive.
    pub avg_win: f64,
    pub avg_loss: f64,
    pub safety_fraction: f64,
    pub min_position: f64,
    pub max_position: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig {
            win_rate: 0.55,
            avg_win: 0.10,
            avg_loss: 0.05,
            safety_fraction: 0.25,
            min_position: 0.01,
            max_position: 0.08,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizeResult {
    pub ticker: String,
    /// `(b*p - q) / b` before any scaling or clamping.
    pub kelly_fraction: f64,
    /// Kelly after the safety fraction and conviction scaling.
    pub scaled_fraction: f64,
    pub final_fraction: f64,
    pub win_rate: f64,
}

/// Raw Kelly fraction for win probability `p` and payoff ratio `b`.
pub fn kelly_fraction(win_rate: f64, payoff_ratio: f64) -> f64 {
    if payoff_ratio <= 0.0 {
        return 0.0;
    }
    let q = 1.0 - win_rate;
    (payoff_ratio * win_rate - q) / payoff_ratio
}

/// A non-positive Kelly edge sizes to zero rather than to the minimum.
pub fn compute_position_size(ticker: &str, conviction: u8, config: &SizingConfig) -> PositionSizeResult {
    let b = if config.avg_loss > 0.0 {
        config.avg_win / config.avg_loss
    } else {
        0.0
    };
    let kelly = kelly_fraction(config.win_rate, b);
    let scaled = kelly * config.safety_fraction * (f64::from(conviction.min(10)) / 10.0);
    let final_fraction = if kelly <= 0.0 || scaled <= 0.0 {
        0.0
    } else {
        scaled.clamp(config.min_position, config.max_position)
    };
    PositionSizeResult {
        ticker: ticker.to_string(),
        kelly_fraction: kelly,
        scaled_fraction: scaled,
        final_fraction,
        win_rate: config.win_rate,
    }
}
