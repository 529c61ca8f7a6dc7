//! Per-security input snapshot consumed by the factor modules.
//!
//! A [`SecurityInput`] is built once per scoring pass by the caller and is
//! never mutated by the engine. Every field except identity is optional:
//! absent data lowers completeness instead of failing.

use chrono::{NaiveDate, NaiveDateTime};

use super::ohlcv::OhlcvBar;

/// Number of trailing bars averaged when no average volume is supplied.
pub const AVG_VOLUME_BARS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fundamentals {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub gross_profit: Option<f64>,
    pub total_assets: Option<f64>,
    pub gross_margin: Option<f64>,
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    /// Oldest first.
    pub margin_history: Vec<f64>,
    pub current_ratio: Option<f64>,
    pub avg_volume: Option<f64>,
    pub days_to_cover: Option<f64>,
}

/// Ratios a data provider may already have computed. When present they take
/// precedence over values derived from the price series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecomputedStats {
    pub momentum_12_1: Option<f64>,
    pub return_6m: Option<f64>,
    pub volatility: Option<f64>,
    pub beta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstitutionalHolding {
    pub fund: String,
    pub shares: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn sign(self) -> f64 {
        match self {
            TradeSide::Buy => 1.0,
            TradeSide::Sell => -1.0,
        }
    }
}

/// An insider filing as delivered by the feed. The date is kept verbatim and
/// parsed at scoring time; records with an unparsable date are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct InsiderTransaction {
    pub name: String,
    pub title: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: Option<f64>,
    pub date: String,
}

/// A legislator trade disclosure. Amounts are disclosed as ranges such as
/// `"$1,001 - $15,000"`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegislatorTransaction {
    pub name: String,
    pub side: TradeSide,
    pub amount_range: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnershipFlow {
    pub current_holdings: Vec<InstitutionalHolding>,
    pub previous_holdings: Vec<InstitutionalHolding>,
    pub insider_transactions: Vec<InsiderTransaction>,
    pub legislator_transactions: Vec<LegislatorTransaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityInput {
    pub ticker: String,
    pub sector: Option<String>,
    pub as_of: NaiveDate,
    /// Oldest first, no bars after `as_of`.
    pub bars: Vec<OhlcvBar>,
    pub fundamentals: Fundamentals,
    pub precomputed: PrecomputedStats,
    pub ownership: OwnershipFlow,
    pub next_earnings: Option<NaiveDate>,
}

impl SecurityInput {
    /// A snapshot with identity only; every optional field absent.
    pub fn new(ticker: impl Into<String>, as_of: NaiveDate) -> Self {
        SecurityInput {
            ticker: ticker.into(),
            sector: None,
            as_of,
            bars: Vec::new(),
            fundamentals: Fundamentals::default(),
            precomputed: PrecomputedStats::default(),
            ownership: OwnershipFlow::default(),
            next_earnings: None,
        }
    }

    /// Explicit price, else the last close.
    pub fn price(&self) -> Option<f64> {
        self.fundamentals
            .price
            .or_else(|| self.bars.last().map(|b| b.close))
            .filter(|p| p.is_finite())
    }

    /// Supplied average volume, else the mean of the trailing bars.
    pub fn avg_volume(&self) -> Option<f64> {
        if let Some(v) = self.fundamentals.avg_volume {
            return Some(v);
        }
        if self.bars.is_empty() {
            return None;
        }
        let start = self.bars.len().saturating_sub(AVG_VOLUME_BARS);
        let window = &self.bars[start..];
        Some(window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64)
    }

    pub fn avg_dollar_volume(&self) -> Option<f64> {
        Some(self.avg_volume()? * self.price()?)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Parse a feed date. Accepts ISO dates, US `month/day/year` and ISO
/// timestamps (time part ignored).
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Parse a disclosed amount range to its midpoint. A single amount parses to
/// itself; an open-ended range such as `"Over $50,000,000"` to its bound.
pub fn parse_amount_range(raw: &str) -> Option<f64> {
    let bounds: Vec<f64> = raw
        .split(['-', '–'])
        .map(parse_dollars)
        .collect::<Option<Vec<_>>>()?;
    match bounds.as_slice() {
        [single] => Some(*single),
        [low, high] if high >= low => Some((low + high) / 2.0),
        _ => None,
    }
}

fn parse_dollars(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64, volume: i64) -> OhlcvBar {
        OhlcvBar {
            ticker: "KO".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    #[test]
    fn new_input_has_no_data() {
        let input = SecurityInput::new("KO", as_of());
        assert!(input.price().is_none());
        assert!(input.avg_volume().is_none());
        assert!(input.avg_dollar_volume().is_none());
    }

    #[test]
    fn price_prefers_explicit_value() {
        let mut input = SecurityInput::new("KO", as_of());
        input.bars = vec![bar(1, 60.0, 100)];
        assert_eq!(input.price(), Some(60.0));
        input.fundamentals.price = Some(61.5);
        assert_eq!(input.price(), Some(61.5));
    }

    #[test]
    fn avg_volume_from_bars() {
        let mut input = SecurityInput::new("KO", as_of());
        input.bars = vec![bar(1, 10.0, 100), bar(2, 10.0, 300)];
        assert_eq!(input.avg_volume(), Some(200.0));
        assert_eq!(input.avg_dollar_volume(), Some(2_000.0));
    }

    #[test]
    fn parses_record_date_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(parse_record_date("2024-02-09"), Some(d));
        assert_eq!(parse_record_date("02/09/2024"), Some(d));
        assert_eq!(parse_record_date("2024-02-09T16:30:00"), Some(d));
        assert_eq!(parse_record_date("last tuesday"), None);
    }

    #[test]
    fn parses_amount_ranges() {
        assert_eq!(parse_amount_range("$1,001 - $15,000"), Some(8_000.5));
        assert_eq!(parse_amount_range("$50,000,000"), Some(50_000_000.0));
        assert_eq!(parse_amount_range("unknown"), None);
        assert_eq!(parse_amount_range("$15,000 - $1,001"), None);
    }
}
