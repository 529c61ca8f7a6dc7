//! Backtest performance metrics.

use super::backtest::{BacktestResult, compound};
use super::portfolio::EquityPoint;
use super::position::BacktestTrade;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub benchmark_return: f64,
    pub alpha: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of periods spent below a prior equity peak.
    pub max_drawdown_duration: i64,
    pub periods: usize,
    /// Fraction of periods in which the portfolio beat the benchmark.
    pub period_hit_rate: f64,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_days: f64,
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Self {
        let returns: Vec<f64> = result.periods.iter().map(|p| p.portfolio_return).collect();
        let total_return = compound(returns.iter().copied());
        let benchmark_return = compound(result.periods.iter().map(|p| p.benchmark_return));

        let years = returns.len() as f64 / result.periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&result.equity_curve);
        let period_rf = result.risk_free_rate / result.periods_per_year;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&returns, period_rf, result.periods_per_year);

        let beats = result
            .periods
            .iter()
            .filter(|p| p.portfolio_return > p.benchmark_return)
            .count();
        let period_hit_rate = if result.periods.is_empty() {
            0.0
        } else {
            beats as f64 / result.periods.len() as f64
        };

        let trades = TradeStats::from_trades(&result.trades);

        Metrics {
            total_return,
            benchmark_return,
            alpha: total_return - benchmark_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            periods: result.periods.len(),
            period_hit_rate,
            trades_won: trades.won,
            trades_lost: trades.lost,
            trades_breakeven: trades.breakeven,
            win_rate: trades.win_rate(),
            profit_factor: trades.profit_factor(),
            avg_win: trades.avg_win(),
            avg_loss: trades.avg_loss(),
            largest_win: trades.largest_win,
            largest_loss: trades.largest_loss,
            avg_holding_days: trades.avg_holding_days(),
        }
    }
}

/// Win/loss tallies over net trade returns.
#[derive(Debug, Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    breakeven: usize,
    total_wins: f64,
    total_losses: f64,
    largest_win: f64,
    largest_loss: f64,
    holding_days: i64,
}

impl TradeStats {
    fn from_trades(trades: &[BacktestTrade]) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades {
            let r = trade.net_return();
            if r > 0.0 {
                stats.won += 1;
                stats.total_wins += r;
                stats.largest_win = stats.largest_win.max(r);
            } else if r < 0.0 {
                stats.lost += 1;
                stats.total_losses += r.abs();
                stats.largest_loss = stats.largest_loss.max(r.abs());
            } else {
                stats.breakeven += 1;
            }
            stats.holding_days += trade.holding_days();
        }
        stats
    }

    fn total(&self) -> usize {
        self.won + self.lost + self.breakeven
    }

    fn win_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.won as f64 / n as f64,
        }
    }

    fn profit_factor(&self) -> f64 {
        if self.total_losses > 0.0 {
            self.total_wins / self.total_losses
        } else if self.total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn avg_win(&self) -> f64 {
        if self.won > 0 { self.total_wins / self.won as f64 } else { 0.0 }
    }

    fn avg_loss(&self) -> f64 {
        if self.lost > 0 { self.total_losses / self.lost as f64 } else { 0.0 }
    }

    fn avg_holding_days(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.holding_days as f64 / n as f64,
        }
    }
}

/// Maximum peak-to-trough decline of the equity curve and the longest run of
/// points spent under water.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

/// Annualized Sharpe and Sortino ratios of per-period returns.
pub fn compute_risk_adjusted(returns: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let scale = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * scale
    } else {
        0.0
    };

    let downside_variance = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside_variance.sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}
