//! Market regime detection.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. volatility index > `high_volatility_vix` => HighVolatility
//! 2. benchmark above its average AND volatility index < `bull_max_vix` => Bull
//! 3. benchmark below its average AND volatility index > `bear_min_vix` => Bear
//! 4. otherwise => Sideways (including total data absence)

use std::fmt;

use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarketRegime {
    Bull,
    Bear,
    Sideways,
    HighVolatility,
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 4] = [
        MarketRegime::Bull,
        MarketRegime::Bear,
        MarketRegime::Sideways,
        MarketRegime::HighVolatility,
    ];

    /// Position of the regime in [`MarketRegime::ALL`]; used to index the
    /// per-regime configuration tables.
    pub fn index(self) -> usize {
        match self {
            MarketRegime::Bull => 0,
            MarketRegime::Bear => 1,
            MarketRegime::Sideways => 2,
            MarketRegime::HighVolatility => 3,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            MarketRegime::Bull => "bull",
            MarketRegime::Bear => "bear",
            MarketRegime::Sideways => "sideways",
            MarketRegime::HighVolatility => "high_volatility",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketRegime::Bull => "Bull",
            MarketRegime::Bear => "Bear",
            MarketRegime::Sideways => "Sideways",
            MarketRegime::HighVolatility => "High Volatility",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub high_volatility_vix: f64,
    pub bull_max_vix: f64,
    pub bear_min_vix: f64,
    pub average_period: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            high_volatility_vix: 30.0,
            bull_max_vix: 20.0,
            bear_min_vix: 25.0,
            average_period: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegimeInputs {
    pub benchmark_price: Option<f64>,
    pub benchmark_average: Option<f64>,
    pub volatility_index: Option<f64>,
}

impl RegimeInputs {
    /// Derive price and trailing average from benchmark history. The average
    /// is absent when there are fewer bars than the period.
    pub fn from_history(
        bars: &[OhlcvBar],
        volatility_index: Option<f64>,
        average_period: usize,
    ) -> Self {
        let benchmark_price = bars.last().map(|b| b.close);
        let benchmark_average = if average_period > 0 && bars.len() >= average_period {
            let window = &bars[bars.len() - average_period..];
            Some(window.iter().map(|b| b.close).sum::<f64>() / average_period as f64)
        } else {
            None
        };
        RegimeInputs {
            benchmark_price,
            benchmark_average,
            volatility_index,
        }
    }

    fn present_count(&self) -> usize {
        [
            self.benchmark_price,
            self.benchmark_average,
            self.volatility_index,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeContext {
    pub regime: MarketRegime,
    pub inputs: RegimeInputs,
    /// Fraction of the three inputs that were present.
    pub confidence: f64,
    pub description: String,
}

impl RegimeContext {
    /// A Sideways context with no inputs, as produced by total data absence.
    pub fn neutral() -> Self {
        detect_regime(&RegimeInputs::default(), &RegimeConfig::default())
    }
}

pub fn detect_regime(inputs: &RegimeInputs, config: &RegimeConfig) -> RegimeContext {
    let confidence = inputs.present_count() as f64 / 3.0;
    let vix = inputs.volatility_index;
    let trend = match (inputs.benchmark_price, inputs.benchmark_average) {
        (Some(p), Some(avg)) => Some((p, avg)),
        _ => None,
    };

    let (regime, description) = if let Some(v) = vix.filter(|v| *v > config.high_volatility_vix) {
        (
            MarketRegime::HighVolatility,
            format!(
                "volatility index {v:.1} above {:.1}",
                config.high_volatility_vix
            ),
        )
    } else {
        match (trend, vix) {
            (Some((p, avg)), Some(v)) if p > avg && v < config.bull_max_vix => (
                MarketRegime::Bull,
                format!("benchmark {p:.2} above average {avg:.2} with volatility index {v:.1}"),
            ),
            (Some((p, avg)), Some(v)) if p < avg && v > config.bear_min_vix => (
                MarketRegime::Bear,
                format!("benchmark {p:.2} below average {avg:.2} with volatility index {v:.1}"),
            ),
            (None, None) => (
                MarketRegime::Sideways,
                "no benchmark trend or volatility data".to_string(),
            ),
            _ => (
                MarketRegime::Sideways,
                "mixed trend and volatility signals".to_string(),
            ),
        }
    };

    RegimeContext {
        regime,
        inputs: *inputs,
        confidence,
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn inputs(price: Option<f64>, avg: Option<f64>, vix: Option<f64>) -> RegimeInputs {
        RegimeInputs {
            benchmark_price: price,
            benchmark_average: avg,
            volatility_index: vix,
        }
    }

    fn detect(price: Option<f64>, avg: Option<f64>, vix: Option<f64>) -> RegimeContext {
        detect_regime(&inputs(price, avg, vix), &RegimeConfig::default())
    }

    #[test]
    fn bull_market() {
        let ctx = detect(Some(500.0), Some(480.0), Some(15.0));
        assert_eq!(ctx.regime, MarketRegime::Bull);
        assert_relative_eq!(ctx.confidence, 1.0);
    }

    #[test]
    fn high_volatility_overrides_trend() {
        assert_eq!(
            detect(Some(500.0), Some(480.0), Some(35.0)).regime,
            MarketRegime::HighVolatility
        );
        assert_eq!(
            detect(Some(400.0), Some(480.0), Some(35.0)).regime,
            MarketRegime::HighVolatility
        );
        assert_eq!(detect(None, None, Some(35.0)).regime, MarketRegime::HighVolatility);
    }

    #[test]
    fn high_volatility_threshold_is_strict() {
        let below = detect(Some(400.0), Some(480.0), Some(29.9));
        let at = detect(Some(400.0), Some(480.0), Some(30.0));
        let above = detect(Some(400.0), Some(480.0), Some(30.1));
        assert_eq!(below.regime, MarketRegime::Bear);
        assert_eq!(at.regime, MarketRegime::Bear);
        assert_eq!(above.regime, MarketRegime::HighVolatility);
    }

    #[test]
    fn bear_market() {
        assert_eq!(
            detect(Some(400.0), Some(480.0), Some(27.0)).regime,
            MarketRegime::Bear
        );
    }

    #[test]
    fn uptrend_with_elevated_vix_is_sideways() {
        assert_eq!(
            detect(Some(500.0), Some(480.0), Some(22.0)).regime,
            MarketRegime::Sideways
        );
    }

    #[test]
    fn downtrend_with_calm_vix_is_sideways() {
        assert_eq!(
            detect(Some(400.0), Some(480.0), Some(18.0)).regime,
            MarketRegime::Sideways
        );
    }

    #[test]
    fn no_data_is_sideways_with_zero_confidence() {
        let ctx = RegimeContext::neutral();
        assert_eq!(ctx.regime, MarketRegime::Sideways);
        assert_relative_eq!(ctx.confidence, 0.0);
    }

    #[test]
    fn missing_vix_cannot_confirm_trend() {
        let ctx = detect(Some(500.0), Some(480.0), None);
        assert_eq!(ctx.regime, MarketRegime::Sideways);
        assert_relative_eq!(ctx.confidence, 2.0 / 3.0);
    }

    #[test]
    fn inputs_from_history() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<OhlcvBar> = (0..5)
            .map(|i| OhlcvBar {
                ticker: "SPY".into(),
                date: start + chrono::Duration::days(i),
                open: 0.0,
                high: 0.0,
                low: 0.0,
                close: 100.0 + i as f64,
                volume: 0,
            })
            .collect();
        let full = RegimeInputs::from_history(&bars, Some(14.0), 4);
        assert_eq!(full.benchmark_price, Some(104.0));
        assert_relative_eq!(full.benchmark_average.unwrap(), 102.5);

        let short = RegimeInputs::from_history(&bars, None, 200);
        assert!(short.benchmark_average.is_none());
        assert_eq!(short.benchmark_price, Some(104.0));
    }
}
