//! OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// Simple return from `prev_close` to this bar's close. `None` for a
    /// non-positive previous close.
    pub fn return_since(&self, prev_close: f64) -> Option<f64> {
        if prev_close > 0.0 {
            Some(self.close / prev_close - 1.0)
        } else {
            None
        }
    }
}

/// Daily simple returns of consecutive closes. Pairs with a non-positive
/// previous close are dropped.
pub fn daily_returns(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.windows(2)
        .filter_map(|w| w[1].return_since(w[0].close))
        .collect()
}
