//! CSV file data adapter.
//!
//! One directory per dataset. For a ticker `T`:
//!
//! - `T.csv`: `date,open,high,low,close,volume` (required)
//! - `T_fundamentals.csv`: `date` plus any of the [`Fundamentals`] field names
//!   as headers; `margin_history` is `;`-separated
//! - `T_holdings.csv`: `date,fund,shares,value`
//! - `T_insiders.csv`: `date,name,title,side,shares,price`
//! - `T_legislators.csv`: `date,name,side,amount_range`
//! - `T_earnings.csv`: `date`
//!
//! Only the price file is required. Malformed rows are skipped with a warning.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::error::FactorlabError;
use crate::domain::history::{FundamentalSnapshot, HoldingsSnapshot};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::security::{
    Fundamentals, InsiderTransaction, InstitutionalHolding, LegislatorTransaction, TradeSide,
};
use crate::ports::data_port::{MarketDataPort, OwnershipHistory};

const SIDECAR_SUFFIXES: [&str; 5] = [
    "_fundamentals",
    "_holdings",
    "_insiders",
    "_legislators",
    "_earnings",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, suffix: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}{suffix}.csv"))
    }

    /// Header-addressed rows of an optional sidecar file; `None` when the file
    /// does not exist.
    fn read_rows(&self, path: &Path) -> Result<Option<Vec<Row>>, FactorlabError> {
        if !path.exists() {
            return Ok(None);
        }
        let mut rdr = csv::Reader::from_path(path).map_err(|e| malformed(path, e))?;
        let headers: Rc<HashMap<String, usize>> = rdr
            .headers()
            .map_err(|e| malformed(path, e))?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect::<HashMap<_, _>>()
            .into();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            match result {
                Ok(record) => rows.push(Row {
                    headers: Rc::clone(&headers),
                    record,
                }),
                Err(e) => warn!(path = %path.display(), line = line + 2, error = %e, "skipping unreadable row"),
            }
        }
        Ok(Some(rows))
    }
}

fn malformed(path: &Path, err: impl std::fmt::Display) -> FactorlabError {
    FactorlabError::MalformedInput {
        source_name: path.display().to_string(),
        reason: err.to_string(),
    }
}

struct Row {
    headers: Rc<HashMap<String, usize>>,
    record: csv::StringRecord,
}

impl Row {
    fn text(&self, column: &str) -> Option<&str> {
        self.headers
            .get(column)
            .and_then(|&i| self.record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.text(column)
            .and_then(|v| v.replace(',', "").parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    fn date(&self) -> Option<NaiveDate> {
        self.text("date")
            .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
    }
}

pub fn parse_side(raw: &str) -> Option<TradeSide> {
    let side = raw.trim().to_lowercase();
    if side.starts_with("buy") || side.starts_with("purchase") || side == "p" {
        Some(TradeSide::Buy)
    } else if side.starts_with("sell") || side.starts_with("sale") || side == "s" {
        Some(TradeSide::Sell)
    } else {
        None
    }
}

fn parse_bar(ticker: &str, record: &csv::StringRecord) -> Option<OhlcvBar> {
    let field = |i: usize| record.get(i).map(str::trim);
    let number = |i: usize| field(i).and_then(|v| v.parse::<f64>().ok());
    let volume = field(5).and_then(|v| {
        v.parse::<i64>()
            .ok()
            .or_else(|| v.parse::<f64>().ok().map(|f| f.round() as i64))
    });
    Some(OhlcvBar {
        ticker: ticker.to_string(),
        date: NaiveDate::parse_from_str(field(0)?, "%Y-%m-%d").ok()?,
        open: number(1)?,
        high: number(2)?,
        low: number(3)?,
        close: number(4)?,
        volume: volume?,
    })
}

fn parse_fundamentals(row: &Row) -> Fundamentals {
    Fundamentals {
        price: row.number("price"),
        market_cap: row.number("market_cap"),
        eps: row.number("eps"),
        book_value_per_share: row.number("book_value_per_share"),
        free_cash_flow: row.number("free_cash_flow"),
        gross_profit: row.number("gross_profit"),
        total_assets: row.number("total_assets"),
        gross_margin: row.number("gross_margin"),
        roe: row.number("roe"),
        debt_to_equity: row.number("debt_to_equity"),
        margin_history: row
            .text("margin_history")
            .map(|v| v.split(';').filter_map(|m| m.trim().parse::<f64>().ok()).collect())
            .unwrap_or_default(),
        current_ratio: row.number("current_ratio"),
        avg_volume: row.number("avg_volume"),
        days_to_cover: row.number("days_to_cover"),
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(&self, ticker: &str) -> Result<Vec<OhlcvBar>, FactorlabError> {
        let path = self.csv_path(ticker, "");
        if !path.exists() {
            return Err(FactorlabError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| malformed(&path, e))?;
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let parsed = result.ok().and_then(|record| parse_bar(ticker, &record));
            match parsed {
                Some(bar) => bars.push(bar),
                None => warn!(%ticker, line = line + 2, "skipping malformed price row"),
            }
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn fetch_fundamentals(&self, ticker: &str) -> Result<Vec<FundamentalSnapshot>, FactorlabError> {
        let Some(rows) = self.read_rows(&self.csv_path(ticker, "_fundamentals"))? else {
            return Ok(Vec::new());
        };
        let mut snapshots = Vec::new();
        for row in rows {
            match row.date() {
                Some(date) => snapshots.push(FundamentalSnapshot {
                    date,
                    fundamentals: parse_fundamentals(&row),
                }),
                None => warn!(%ticker, "skipping fundamentals row without a valid date"),
            }
        }
        snapshots.sort_by_key(|s| s.date);
        Ok(snapshots)
    }

    fn fetch_ownership(&self, ticker: &str) -> Result<OwnershipHistory, FactorlabError> {
        let mut ownership = OwnershipHistory::default();

        if let Some(rows) = self.read_rows(&self.csv_path(ticker, "_holdings"))? {
            let mut by_date: BTreeMap<NaiveDate, Vec<InstitutionalHolding>> = BTreeMap::new();
            for row in rows {
                let parsed = row.date().zip(row.text("fund")).zip(row.number("shares"));
                let Some(((date, fund), shares)) = parsed else {
                    warn!(%ticker, "skipping malformed holdings row");
                    continue;
                };
                by_date.entry(date).or_default().push(InstitutionalHolding {
                    fund: fund.to_string(),
                    shares,
                    value: row.number("value").unwrap_or(0.0),
                });
            }
            ownership.holdings = by_date
                .into_iter()
                .map(|(date, holdings)| HoldingsSnapshot { date, holdings })
                .collect();
        }

        // Dates stay verbatim; the scorer parses and skips bad ones.
        if let Some(rows) = self.read_rows(&self.csv_path(ticker, "_insiders"))? {
            for row in rows {
                let side = row.text("side").and_then(parse_side);
                let (Some(name), Some(side), Some(shares), Some(date)) =
                    (row.text("name"), side, row.number("shares"), row.text("date"))
                else {
                    warn!(%ticker, "skipping malformed insider row");
                    continue;
                };
                ownership.insider_transactions.push(InsiderTransaction {
                    name: name.to_string(),
                    title: row.text("title").unwrap_or_default().to_string(),
                    side,
                    shares,
                    price: row.number("price"),
                    date: date.to_string(),
                });
            }
        }

        if let Some(rows) = self.read_rows(&self.csv_path(ticker, "_legislators"))? {
            for row in rows {
                let side = row.text("side").and_then(parse_side);
                let (Some(name), Some(side), Some(amount_range), Some(date)) =
                    (row.text("name"), side, row.text("amount_range"), row.text("date"))
                else {
                    warn!(%ticker, "skipping malformed legislator row");
                    continue;
                };
                ownership.legislator_transactions.push(LegislatorTransaction {
                    name: name.to_string(),
                    side,
                    amount_range: amount_range.to_string(),
                    date: date.to_string(),
                });
            }
        }

        Ok(ownership)
    }

    fn fetch_earnings_dates(&self, ticker: &str) -> Result<Vec<NaiveDate>, FactorlabError> {
        let Some(rows) = self.read_rows(&self.csv_path(ticker, "_earnings"))? else {
            return Ok(Vec::new());
        };
        let mut dates: Vec<NaiveDate> = rows.iter().filter_map(Row::date).collect();
        dates.sort();
        dates.dedup();
        Ok(dates)
    }

    fn list_tickers(&self) -> Result<Vec<String>, FactorlabError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut tickers = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            if SIDECAR_SUFFIXES.iter().any(|s| stem.ends_with(s)) {
                continue;
            }
            tickers.push(stem.to_string());
        }

        tickers.sort();
        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("ACME.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-16,105.0,115.0,100.0,110.0,60000\n\
             2024-01-15,100.0,110.0,90.0,105.0,50000\n\
             not-a-date,1,1,1,1,1\n\
             2024-01-17,110.0,120.0,105.0,115.0,55000\n",
        )
        .unwrap();
        fs::write(
            path.join("ACME_fundamentals.csv"),
            "date,market_cap,eps,roe,margin_history\n\
             2023-12-31,5000000000,4.2,0.18,0.40;0.41;0.39\n\
             bad,1,1,1,\n",
        )
        .unwrap();
        fs::write(
            path.join("ACME_holdings.csv"),
            "date,fund,shares,value\n\
             2023-09-30,Baupost Group,1000,100000\n\
             2023-12-31,Baupost Group,1500,160000\n\
             2023-12-31,Citadel Advisors,200,21000\n",
        )
        .unwrap();
        fs::write(
            path.join("ACME_insiders.csv"),
            "date,name,title,side,shares,price\n\
             2024-01-10,Jane Roe,CEO,Buy,5000,101.5\n\
             2024-01-11,John Doe,Director,hold,100,\n",
        )
        .unwrap();
        fs::write(
            path.join("ACME_legislators.csv"),
            "date,name,side,amount_range\n\
             01/05/2024,Sen. Smith,Purchase,\"$1,001 - $15,000\"\n",
        )
        .unwrap();
        fs::write(path.join("ACME_earnings.csv"), "date\n2024-04-20\n2024-01-25\n").unwrap();
        fs::write(path.join("SPY.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_sorts_and_skips_malformed() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.fetch_bars("ACME").unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[2].close, 115.0);
    }

    #[test]
    fn fetch_bars_missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_bars("XYZ"),
            Err(FactorlabError::NoData { .. })
        ));
    }

    #[test]
    fn fetch_fundamentals_by_header() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let snapshots = adapter.fetch_fundamentals("ACME").unwrap();
        assert_eq!(snapshots.len(), 1);
        let f = &snapshots[0].fundamentals;
        assert_eq!(f.market_cap, Some(5_000_000_000.0));
        assert_eq!(f.eps, Some(4.2));
        assert_eq!(f.margin_history, vec![0.40, 0.41, 0.39]);
        assert_eq!(f.debt_to_equity, None);

        assert!(adapter.fetch_fundamentals("SPY").unwrap().is_empty());
    }

    #[test]
    fn fetch_ownership_groups_and_skips() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let ownership = adapter.fetch_ownership("ACME").unwrap();

        assert_eq!(ownership.holdings.len(), 2);
        assert_eq!(ownership.holdings[1].holdings.len(), 2);
        assert_eq!(ownership.insider_transactions.len(), 1);
        assert_eq!(ownership.insider_transactions[0].side, TradeSide::Buy);
        assert_eq!(ownership.insider_transactions[0].price, Some(101.5));
        assert_eq!(ownership.legislator_transactions.len(), 1);
        assert_eq!(ownership.legislator_transactions[0].amount_range, "$1,001 - $15,000");
        assert_eq!(ownership.legislator_transactions[0].date, "01/05/2024");
    }

    #[test]
    fn fetch_earnings_sorted() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let dates = adapter.fetch_earnings_dates("ACME").unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
                NaiveDate::from_ymd_opt(2024, 4, 20).unwrap(),
            ]
        );
    }

    #[test]
    fn list_tickers_ignores_sidecars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_tickers().unwrap(), vec!["ACME", "SPY"]);
    }

    #[test]
    fn sides() {
        assert_eq!(parse_side("P"), Some(TradeSide::Buy));
        assert_eq!(parse_side("Sale (Partial)"), Some(TradeSide::Sell));
        assert_eq!(parse_side("exchange"), None);
    }
}
