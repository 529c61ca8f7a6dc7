//! Ticker universe: parse ticker lists and load each ticker's history,
//! skipping tickers without enough data.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::domain::error::FactorlabError;
use crate::domain::history::TickerHistory;
use crate::ports::data_port::MarketDataPort;

pub const MIN_BARS: usize = 30;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("expected TICKER=Sector, got {0:?}")]
    InvalidSectorPair(String),
}

/// Comma-separated tickers: trimmed, upper-cased, no blanks or duplicates.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// `"AAPL=Technology, XOM=Energy"` into a ticker to sector map.
pub fn parse_sector_map(input: &str) -> Result<HashMap<String, String>, UniverseError> {
    let mut sectors = HashMap::new();
    for pair in input.split(',') {
        let (ticker, sector) = pair
            .split_once('=')
            .map(|(t, s)| (t.trim(), s.trim()))
            .filter(|(t, s)| !t.is_empty() && !s.is_empty())
            .ok_or_else(|| UniverseError::InvalidSectorPair(pair.trim().to_string()))?;
        let ticker = ticker.to_uppercase();
        if sectors.insert(ticker.clone(), sector.to_string()).is_some() {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
    }
    Ok(sectors)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub histories: Vec<TickerHistory>,
    pub skipped: Vec<SkippedTicker>,
}

impl LoadedUniverse {
    pub fn count(&self) -> usize {
        self.histories.len()
    }
}

/// Load bars, fundamentals, ownership and earnings for every ticker. Tickers
/// with no bars or fewer than [`MIN_BARS`] are skipped with a warning; an
/// empty result is an error.
pub fn load_universe(
    port: &dyn MarketDataPort,
    tickers: &[String],
    sectors: &HashMap<String, String>,
) -> Result<LoadedUniverse, FactorlabError> {
    let mut histories = Vec::new();
    let mut skipped = Vec::new();

    for ticker in tickers {
        let bars = match port.fetch_bars(ticker) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(%ticker, error = %e, "skipping ticker");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(%ticker, "skipping ticker: no data found");
            skipped.push(SkippedTicker {
                ticker: ticker.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        if bars.len() < MIN_BARS {
            warn!(%ticker, bars = bars.len(), minimum = MIN_BARS, "skipping ticker: insufficient bars");
            skipped.push(SkippedTicker {
                ticker: ticker.clone(),
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        let bar_count = bars.len();
        let ownership = port.fetch_ownership(ticker)?;
        let mut history = TickerHistory::new(ticker.clone(), bars)
            .with_fundamentals(port.fetch_fundamentals(ticker)?)
            .with_holdings(ownership.holdings)
            .with_earnings_dates(port.fetch_earnings_dates(ticker)?);
        history.insider_transactions = ownership.insider_transactions;
        history.legislator_transactions = ownership.legislator_transactions;
        if let Some(sector) = sectors.get(ticker) {
            history = history.with_sector(sector.clone());
        }
        info!(%ticker, bars = bar_count, "loaded ticker");
        histories.push(history);
    }

    if histories.is_empty() {
        return Err(FactorlabError::InsufficientData {
            ticker: "all".to_string(),
            bars: 0,
            minimum: MIN_BARS,
        });
    }

    if !skipped.is_empty() {
        warn!(
            loaded = histories.len(),
            requested = tickers.len(),
            "some tickers were skipped"
        );
    }

    Ok(LoadedUniverse { histories, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::FundamentalSnapshot;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    #[test]
    fn parse_single_ticker() {
        assert_eq!(parse_tickers("aapl").unwrap(), vec!["AAPL"]);
    }

    #[test]
    fn parse_trims_and_uppercases() {
        assert_eq!(parse_tickers(" msft , nvda,Xom ").unwrap(), vec!["MSFT", "NVDA", "XOM"]);
    }

    #[test]
    fn parse_rejects_empty_token() {
        assert_eq!(parse_tickers("AAPL,,MSFT"), Err(UniverseError::EmptyToken));
        assert_eq!(parse_tickers(""), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_rejects_duplicates() {
        assert_eq!(
            parse_tickers("AAPL,msft,aapl"),
            Err(UniverseError::DuplicateTicker("AAPL".into()))
        );
    }

    #[test]
    fn sector_map() {
        let map = parse_sector_map("aapl=Information Technology, XOM = Energy").unwrap();
        assert_eq!(map["AAPL"], "Information Technology");
        assert_eq!(map["XOM"], "Energy");
        assert!(matches!(parse_sector_map("AAPL"), Err(UniverseError::InvalidSectorPair(_))));
        assert!(matches!(parse_sector_map("AAPL="), Err(UniverseError::InvalidSectorPair(_))));
    }

    struct StubPort;

    impl MarketDataPort for StubPort {
        fn fetch_bars(&self, ticker: &str) -> Result<Vec<OhlcvBar>, FactorlabError> {
            let n = match ticker {
                "LONG" => 40,
                "SHORT" => 5,
                "EMPTY" => 0,
                _ => {
                    return Err(FactorlabError::NoData {
                        ticker: ticker.to_string(),
                    });
                }
            };
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            Ok((0..n)
                .map(|i| OhlcvBar {
                    ticker: ticker.to_string(),
                    date: start + chrono::Duration::days(i),
                    open: 10.0,
                    high: 10.0,
                    low: 10.0,
                    close: 10.0,
                    volume: 100,
                })
                .collect())
        }

        fn fetch_fundamentals(&self, _ticker: &str) -> Result<Vec<FundamentalSnapshot>, FactorlabError> {
            Ok(Vec::new())
        }

        fn list_tickers(&self) -> Result<Vec<String>, FactorlabError> {
            Ok(vec!["LONG".into(), "SHORT".into(), "EMPTY".into()])
        }
    }

    #[test]
    fn load_skips_thin_tickers() {
        let tickers: Vec<String> = ["LONG", "SHORT", "EMPTY", "MISSING"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let sectors = HashMap::from([("LONG".to_string(), "Energy".to_string())]);
        let loaded = load_universe(&StubPort, &tickers, &sectors).unwrap();
        assert_eq!(loaded.count(), 1);
        assert_eq!(loaded.histories[0].sector.as_deref(), Some("Energy"));
        assert_eq!(loaded.skipped.len(), 3);
        assert_eq!(
            loaded.skipped[0].reason,
            SkipReason::InsufficientBars { bars: 5 }
        );
        assert_eq!(loaded.skipped[2].reason, SkipReason::NoData);
    }

    #[test]
    fn load_fails_when_nothing_usable() {
        let tickers = vec!["SHORT".to_string()];
        let err = load_universe(&StubPort, &tickers, &HashMap::new()).unwrap_err();
        assert!(matches!(err, FactorlabError::InsufficientData { .. }));
    }
}
