//! Per-ticker position state and closed round trips.

use chrono::NaiveDate;

use super::factor::FactorKind;
use super::regime::MarketRegime;
use super::weights::{FactorWeights, Horizon};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Return of a move from `entry` to `exit` for this direction.
    pub fn price_return(self, entry: f64, exit: f64) -> f64 {
        if entry <= 0.0 {
            return 0.0;
        }
        match self {
            Direction::Long => (exit - entry) / entry,
            Direction::Short => (entry - exit) / entry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    pub fn direction(self) -> Option<Direction> {
        match self {
            PositionState::Flat => None,
            PositionState::Long => Some(Direction::Long),
            PositionState::Short => Some(Direction::Short),
        }
    }
}

impl From<Direction> for PositionState {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => PositionState::Long,
            Direction::Short => PositionState::Short,
        }
    }
}

/// Snapshot of the score that opened a position.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    pub score: f64,
    pub conviction: u8,
    pub horizon: Horizon,
    pub sector: Option<String>,
    pub regime: MarketRegime,
    pub factor_scores: [f64; 6],
    pub factor_weights: FactorWeights,
}

impl EntrySignal {
    pub fn factor_score(&self, kind: FactorKind) -> f64 {
        self.factor_scores[kind.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub ticker: String,
    pub direction: Direction,
    /// Fraction of equity committed at entry.
    pub weight: f64,
    pub entry_date: NaiveDate,
    /// Market close at entry, before slippage.
    pub entry_price: f64,
    pub entry_fill: f64,
    pub benchmark_entry: f64,
    pub signal: EntrySignal,
}

impl OpenPosition {
    pub fn state(&self) -> PositionState {
        self.direction.into()
    }
}

/// One simulated round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestTrade {
    pub ticker: String,
    pub direction: Direction,
    pub weight: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_fill: f64,
    pub exit_fill: f64,
    pub benchmark_entry: f64,
    pub benchmark_exit: f64,
    /// Slippage and commission on both legs, as a fraction of notional.
    pub cost: f64,
    pub signal: EntrySignal,
}

impl BacktestTrade {
    pub fn gross_return(&self) -> f64 {
        self.direction.price_return(self.entry_price, self.exit_price)
    }

    pub fn net_return(&self) -> f64 {
        self.gross_return() - self.cost
    }

    pub fn benchmark_return(&self) -> f64 {
        Direction::Long.price_return(self.benchmark_entry, self.benchmark_exit)
    }

    pub fn alpha(&self) -> f64 {
        self.net_return() - self.benchmark_return()
    }

    pub fn is_winner(&self) -> bool {
        self.net_return() > 0.0
    }

    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}
