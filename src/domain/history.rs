//! Per-ticker history and the unified backtest timeline.
//!
//! A [`TickerHistory`] holds everything known about one security over the
//! whole backtest; [`TickerHistory::input_at`] slices it into the
//! point-in-time [`SecurityInput`] the scorer sees on a given date.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::ohlcv::OhlcvBar;
use super::security::{
    Fundamentals, InsiderTransaction, InstitutionalHolding, LegislatorTransaction, OwnershipFlow,
    SecurityInput, parse_record_date,
};

/// Fundamentals as reported on `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalSnapshot {
    pub date: NaiveDate,
    pub fundamentals: Fundamentals,
}

/// A quarterly institutional holdings report.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsSnapshot {
    pub date: NaiveDate,
    pub holdings: Vec<InstitutionalHolding>,
}

#[derive(Debug, Clone, Default)]
pub struct TickerHistory {
    pub ticker: String,
    pub sector: Option<String>,
    /// Oldest first.
    pub bars: Vec<OhlcvBar>,
    pub date_index: HashMap<NaiveDate, usize>,
    /// Oldest first.
    pub fundamentals: Vec<FundamentalSnapshot>,
    /// Oldest first.
    pub holdings: Vec<HoldingsSnapshot>,
    pub insider_transactions: Vec<InsiderTransaction>,
    pub legislator_transactions: Vec<LegislatorTransaction>,
    pub earnings_dates: Vec<NaiveDate>,
}

impl TickerHistory {
    pub fn new(ticker: impl Into<String>, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        TickerHistory {
            ticker: ticker.into(),
            bars,
            date_index,
            ..Default::default()
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_fundamentals(mut self, mut snapshots: Vec<FundamentalSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.date);
        self.fundamentals = snapshots;
        self
    }

    pub fn with_holdings(mut self, mut snapshots: Vec<HoldingsSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.date);
        self.holdings = snapshots;
        self
    }

    pub fn with_earnings_dates(mut self, mut dates: Vec<NaiveDate>) -> Self {
        dates.sort();
        self.earnings_dates = dates;
        self
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Bars dated on or before `date`.
    pub fn bars_until(&self, date: NaiveDate) -> &[OhlcvBar] {
        let end = self.bars.partition_point(|b| b.date <= date);
        &self.bars[..end]
    }

    /// Last close on or before `date`, carrying prices over missing days.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        self.bars_until(date).last().map(|b| b.close)
    }

    /// The snapshot the scorer would have seen on `as_of`: no bar, report or
    /// filing dated after it.
    pub fn input_at(&self, as_of: NaiveDate) -> SecurityInput {
        let mut input = SecurityInput::new(self.ticker.clone(), as_of);
        input.sector = self.sector.clone();
        input.bars = self.bars_until(as_of).to_vec();

        let reported = self.fundamentals.partition_point(|s| s.date <= as_of);
        if reported > 0 {
            input.fundamentals = self.fundamentals[reported - 1].fundamentals.clone();
        }

        let filed = self.holdings.partition_point(|s| s.date <= as_of);
        let current_holdings = match filed {
            0 => Vec::new(),
            n => self.holdings[n - 1].holdings.clone(),
        };
        let previous_holdings = match filed {
            0 | 1 => Vec::new(),
            n => self.holdings[n - 2].holdings.clone(),
        };
        let not_after = |raw: &str| parse_record_date(raw).is_none_or(|d| d <= as_of);
        input.ownership = OwnershipFlow {
            current_holdings,
            previous_holdings,
            insider_transactions: self
                .insider_transactions
                .iter()
                .filter(|t| not_after(&t.date))
                .cloned()
                .collect(),
            legislator_transactions: self
                .legislator_transactions
                .iter()
                .filter(|t| not_after(&t.date))
                .cloned()
                .collect(),
        };

        input.next_earnings = self.earnings_dates.iter().find(|d| **d >= as_of).copied();
        input
    }
}

/// Sorted union of every date with a bar in any history.
pub fn build_unified_timeline(histories: &[TickerHistory]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = histories
        .iter()
        .flat_map(|h| h.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::security::TradeSide;

    fn make_bar(ticker: &str, date: &str, close: f64) -> OhlcvBar {
        OhlcvBar {
            ticker: ticker.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> TickerHistory {
        TickerHistory::new(
            "ACME",
            vec![
                make_bar("ACME", "2024-01-03", 102.0),
                make_bar("ACME", "2024-01-01", 100.0),
                make_bar("ACME", "2024-01-02", 101.0),
            ],
        )
    }

    #[test]
    fn new_sorts_and_indexes_bars() {
        let h = sample();
        assert_eq!(h.bar_count(), 3);
        assert_eq!(h.date_index.get(&d("2024-01-01")), Some(&0));
        assert!((h.get_bar(d("2024-01-02")).unwrap().close - 101.0).abs() < f64::EPSILON);
        assert!(h.get_bar(d("2024-01-05")).is_none());
    }

    #[test]
    fn close_carries_forward() {
        let h = sample();
        assert_eq!(h.close_on_or_before(d("2024-01-07")), Some(102.0));
        assert_eq!(h.close_on_or_before(d("2023-12-31")), None);
    }

    #[test]
    fn input_has_no_look_ahead() {
        let snapshot = |date: &str, eps: f64| FundamentalSnapshot {
            date: d(date),
            fundamentals: Fundamentals {
                eps: Some(eps),
                ..Default::default()
            },
        };
        let mut h = sample()
            .with_sector("Industrials")
            .with_fundamentals(vec![snapshot("2024-01-02", 2.0), snapshot("2023-12-01", 1.0)])
            .with_earnings_dates(vec![d("2024-02-01"), d("2024-01-01")]);
        h.insider_transactions = vec![
            InsiderTransaction {
                name: "Early".into(),
                title: "CEO".into(),
                side: TradeSide::Buy,
                shares: 100.0,
                price: None,
                date: "2024-01-01".into(),
            },
            InsiderTransaction {
                name: "Late".into(),
                title: "CEO".into(),
                side: TradeSide::Buy,
                shares: 100.0,
                price: None,
                date: "2024-01-03".into(),
            },
        ];

        let input = h.input_at(d("2024-01-02"));
        assert_eq!(input.bars.len(), 2);
        assert_eq!(input.fundamentals.eps, Some(2.0));
        assert_eq!(input.ownership.insider_transactions.len(), 1);
        assert_eq!(input.next_earnings, Some(d("2024-02-01")));
        assert_eq!(input.sector.as_deref(), Some("Industrials"));

        let early = h.input_at(d("2023-12-15"));
        assert!(early.bars.is_empty());
        assert_eq!(early.fundamentals.eps, Some(1.0));
        assert_eq!(early.next_earnings, Some(d("2024-01-01")));
    }

    #[test]
    fn holdings_use_two_latest_reports() {
        let report = |date: &str, shares: f64| HoldingsSnapshot {
            date: d(date),
            holdings: vec![InstitutionalHolding {
                fund: "Fund".into(),
                shares,
                value: shares,
            }],
        };
        let h = sample().with_holdings(vec![
            report("2023-09-30", 1.0),
            report("2023-12-31", 2.0),
            report("2024-03-31", 3.0),
        ]);
        let input = h.input_at(d("2024-01-02"));
        assert_eq!(input.ownership.current_holdings[0].shares, 2.0);
        assert_eq!(input.ownership.previous_holdings[0].shares, 1.0);
    }

    #[test]
    fn unified_timeline_merges_and_sorts() {
        let a = TickerHistory::new(
            "AAA",
            vec![make_bar("AAA", "2024-01-02", 100.0), make_bar("AAA", "2024-01-05", 101.0)],
        );
        let b = TickerHistory::new(
            "BBB",
            vec![make_bar("BBB", "2024-01-01", 50.0), make_bar("BBB", "2024-01-02", 51.0)],
        );
        let timeline = build_unified_timeline(&[a, b]);
        assert_eq!(timeline, vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-05")]);
        assert!(build_unified_timeline(&[]).is_empty());
    }
}
