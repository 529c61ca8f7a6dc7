//! Market data access port trait.

use chrono::NaiveDate;

use crate::domain::error::FactorlabError;
use crate::domain::history::{FundamentalSnapshot, HoldingsSnapshot};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::security::{InsiderTransaction, LegislatorTransaction};

/// Ownership records for one ticker over the whole history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnershipHistory {
    pub holdings: Vec<HoldingsSnapshot>,
    pub insider_transactions: Vec<InsiderTransaction>,
    pub legislator_transactions: Vec<LegislatorTransaction>,
}

pub trait MarketDataPort {
    /// Daily bars, oldest first. `NoData` when the ticker is unknown.
    fn fetch_bars(&self, ticker: &str) -> Result<Vec<OhlcvBar>, FactorlabError>;

    /// Dated fundamentals snapshots; empty when none are available.
    fn fetch_fundamentals(&self, ticker: &str) -> Result<Vec<FundamentalSnapshot>, FactorlabError>;

    fn fetch_ownership(&self, _ticker: &str) -> Result<OwnershipHistory, FactorlabError> {
        Ok(OwnershipHistory::default())
    }

    fn fetch_earnings_dates(&self, _ticker: &str) -> Result<Vec<NaiveDate>, FactorlabError> {
        Ok(Vec::new())
    }

    fn list_tickers(&self) -> Result<Vec<String>, FactorlabError>;
}
