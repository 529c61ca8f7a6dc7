#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use factorlab::domain::error::FactorlabError;
use factorlab::domain::history::{FundamentalSnapshot, TickerHistory};
pub use factorlab::domain::ohlcv::OhlcvBar;
use factorlab::domain::security::Fundamentals;
use factorlab::ports::data_port::{MarketDataPort, OwnershipHistory};
use std::collections::HashMap;

pub struct MockDataPort {
    pub bars: HashMap<String, Vec<OhlcvBar>>,
    pub fundamentals: HashMap<String, Vec<FundamentalSnapshot>>,
    pub ownership: HashMap<String, OwnershipHistory>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            fundamentals: HashMap::new(),
            ownership: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.bars.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_fundamentals(mut self, ticker: &str, snapshots: Vec<FundamentalSnapshot>) -> Self {
        self.fundamentals.insert(ticker.to_string(), snapshots);
        self
    }

    pub fn with_ownership(mut self, ticker: &str, ownership: OwnershipHistory) -> Self {
        self.ownership.insert(ticker.to_string(), ownership);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(&self, ticker: &str) -> Result<Vec<OhlcvBar>, FactorlabError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(FactorlabError::MalformedInput {
                source_name: format!("{ticker}.csv"),
                reason: reason.clone(),
            });
        }
        self.bars
            .get(ticker)
            .cloned()
            .ok_or_else(|| FactorlabError::NoData {
                ticker: ticker.to_string(),
            })
    }

    fn fetch_fundamentals(&self, ticker: &str) -> Result<Vec<FundamentalSnapshot>, FactorlabError> {
        Ok(self.fundamentals.get(ticker).cloned().unwrap_or_default())
    }

    fn fetch_ownership(&self, ticker: &str) -> Result<OwnershipHistory, FactorlabError> {
        Ok(self.ownership.get(ticker).cloned().unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, FactorlabError> {
        let mut tickers: Vec<String> = self.bars.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(ticker: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        ticker: ticker.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000_000,
    }
}

/// `n` consecutive daily bars compounding at `daily_drift` with a small
/// deterministic wobble so volatility is non-zero.
pub fn trending_bars(ticker: &str, start_price: f64, daily_drift: f64, n: usize) -> Vec<OhlcvBar> {
    let mut price = start_price;
    (0..n)
        .map(|i| {
            let wobble = if i % 2 == 0 { 0.002 } else { -0.002 };
            price *= 1.0 + daily_drift + wobble;
            make_bar(ticker, start_date() + Duration::days(i as i64), price)
        })
        .collect()
}

pub fn history(ticker: &str, sector: &str, bars: Vec<OhlcvBar>) -> TickerHistory {
    TickerHistory::new(ticker, bars).with_sector(sector)
}

pub fn strong_fundamentals() -> Fundamentals {
    Fundamentals {
        market_cap: Some(50e9),
        eps: Some(6.0),
        book_value_per_share: Some(40.0),
        free_cash_flow: Some(4e9),
        gross_margin: Some(0.45),
        roe: Some(0.25),
        debt_to_equity: Some(0.3),
        margin_history: vec![0.44, 0.45, 0.45, 0.46, 0.45],
        current_ratio: Some(2.0),
        days_to_cover: Some(1.5),
        ..Default::default()
    }
}
