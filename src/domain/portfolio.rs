//! Simulated portfolio: open positions, closed trades and the equity curve.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::position::{BacktestTrade, OpenPosition, PositionState};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub equity: f64,
    pub initial_capital: f64,
    /// Keyed by ticker; ordered so that iteration is deterministic.
    pub positions: BTreeMap<String, OpenPosition>,
    pub closed_trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            equity: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: OpenPosition) {
        self.positions.insert(position.ticker.clone(), position);
    }

    pub fn state(&self, ticker: &str) -> PositionState {
        self.positions
            .get(ticker)
            .map_or(PositionState::Flat, OpenPosition::state)
    }

    pub fn remove_position(&mut self, ticker: &str) -> Option<OpenPosition> {
        self.positions.remove(ticker)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: BacktestTrade) {
        self.closed_trades.push(trade);
    }

    /// Compound `period_return` into equity and append a curve point.
    pub fn apply_return(&mut self, date: NaiveDate, period_return: f64) {
        self.equity *= 1.0 + period_return;
        self.record_equity(date, self.equity);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Direction, EntrySignal};
    use crate::domain::regime::MarketRegime;
    use crate::domain::weights::{FactorWeights, Horizon};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn position(ticker: &str, direction: Direction, weight: f64) -> OpenPosition {
        OpenPosition {
            ticker: ticker.to_string(),
            direction,
            weight,
            entry_date: date(2),
            entry_price: 100.0,
            entry_fill: 100.0,
            benchmark_entry: 400.0,
            signal: EntrySignal {
                score: 70.0,
                conviction: 7,
                horizon: Horizon::Medium,
                sector: None,
                regime: MarketRegime::Sideways,
                factor_scores: [50.0; 6],
                factor_weights: FactorWeights([1.0 / 6.0; 6]),
            },
        }
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100_000.0);
        assert!((portfolio.equity - 100_000.0).abs() < f64::EPSILON);
        assert!(portfolio.positions.is_empty());
        assert!(portfolio.closed_trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
    }

    #[test]
    fn state_tracks_positions() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.add_position(position("AAA", Direction::Long, 0.05));
        portfolio.add_position(position("BBB", Direction::Short, 0.03));
        assert_eq!(portfolio.state("AAA"), PositionState::Long);
        assert_eq!(portfolio.state("BBB"), PositionState::Short);
        assert_eq!(portfolio.state("CCC"), PositionState::Flat);

        let removed = portfolio.remove_position("AAA");
        assert!(removed.is_some());
        assert_eq!(portfolio.state("AAA"), PositionState::Flat);
        assert_eq!(portfolio.position_count(), 1);
    }

    #[test]
    fn apply_return_compounds() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_return(date(3), 0.10);
        portfolio.apply_return(date(4), -0.10);
        assert!((portfolio.equity - 99_000.0).abs() < 1e-6);
        assert_eq!(portfolio.equity_curve.len(), 2);
        assert_eq!(portfolio.equity_curve[1].date, date(4));
    }
}
