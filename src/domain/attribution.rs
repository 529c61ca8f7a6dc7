//! Per-factor and per-regime attribution of backtest results.

use super::backtest::{PeriodReturn, compound};
use super::factor::FactorKind;
use super::position::BacktestTrade;
use super::regime::MarketRegime;

#[derive(Debug, Clone, PartialEq)]
pub struct FactorAttribution {
    pub kind: FactorKind,
    /// Sum over trades of `weight * net_return * share`, in portfolio return units.
    pub contribution: f64,
    /// Mean of `net_return * share` per trade.
    pub average_trade_contribution: f64,
    /// Mean weighted-score share at entry.
    pub average_share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeAttribution {
    pub regime: MarketRegime,
    pub periods: usize,
    pub mean_portfolio_return: f64,
    pub mean_benchmark_return: f64,
    pub compounded_portfolio_return: f64,
    pub compounded_benchmark_return: f64,
    /// Fraction of periods in which the portfolio beat the benchmark.
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributionReport {
    pub factors: Vec<FactorAttribution>,
    /// Regimes that occurred at least once, in regime order.
    pub regimes: Vec<RegimeAttribution>,
}

/// Each factor's share of the weighted composite at entry. Falls back to the
/// raw weights when every weighted score is zero.
pub fn factor_shares(trade: &BacktestTrade) -> [f64; 6] {
    let signal = &trade.signal;
    let weighted: [f64; 6] =
        std::array::from_fn(|i| signal.factor_scores[i] * signal.factor_weights.0[i]);
    let total: f64 = weighted.iter().sum();
    if total > 0.0 {
        weighted.map(|w| w / total)
    } else {
        let weight_sum = signal.factor_weights.sum();
        if weight_sum > 0.0 {
            signal.factor_weights.0.map(|w| w / weight_sum)
        } else {
            [1.0 / 6.0; 6]
        }
    }
}

pub fn attribute_factors(trades: &[BacktestTrade]) -> Vec<FactorAttribution> {
    FactorKind::ALL
        .iter()
        .map(|&kind| {
            let i = kind.index();
            let mut contribution = 0.0;
            let mut trade_sum = 0.0;
            let mut share_sum = 0.0;
            for trade in trades {
                let share = factor_shares(trade)[i];
                let apportioned = trade.net_return() * share;
                contribution += trade.weight * apportioned;
                trade_sum += apportioned;
                share_sum += share;
            }
            let n = trades.len().max(1) as f64;
            FactorAttribution {
                kind,
                contribution,
                average_trade_contribution: trade_sum / n,
                average_share: share_sum / n,
            }
        })
        .collect()
}

pub fn attribute_regimes(periods: &[PeriodReturn]) -> Vec<RegimeAttribution> {
    MarketRegime::ALL
        .iter()
        .filter_map(|&regime| {
            let in_regime: Vec<&PeriodReturn> =
                periods.iter().filter(|p| p.regime == regime).collect();
            if in_regime.is_empty() {
                return None;
            }
            let n = in_regime.len() as f64;
            let hits = in_regime
                .iter()
                .filter(|p| p.portfolio_return > p.benchmark_return)
                .count();
            Some(RegimeAttribution {
                regime,
                periods: in_regime.len(),
                mean_portfolio_return: in_regime.iter().map(|p| p.portfolio_return).sum::<f64>() / n,
                mean_benchmark_return: in_regime.iter().map(|p| p.benchmark_return).sum::<f64>() / n,
                compounded_portfolio_return: compound(in_regime.iter().map(|p| p.portfolio_return)),
                compounded_benchmark_return: compound(in_regime.iter().map(|p| p.benchmark_return)),
                hit_rate: hits as f64 / n,
            })
        })
        .collect()
}

pub fn attribute(trades: &[BacktestTrade], periods: &[PeriodReturn]) -> AttributionReport {
    AttributionReport {
        factors: attribute_factors(trades),
        regimes: attribute_regimes(periods),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Direction, EntrySignal};
    use crate::domain::weights::{FactorWeights, Horizon};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    fn trade(exit: f64, scores: [f64; 6], weights: [f64; 6]) -> BacktestTrade {
        BacktestTrade {
            ticker: "ACME".into(),
            direction: Direction::Long,
            weight: 0.10,
            entry_date: date(0),
            exit_date: date(21),
            entry_price: 100.0,
            exit_price: exit,
            entry_fill: 100.0,
            exit_fill: exit,
            benchmark_entry: 100.0,
            benchmark_exit: 100.0,
            cost: 0.0,
            signal: EntrySignal {
                score: 70.0,
                conviction: 7,
                horizon: Horizon::Medium,
                sector: None,
                regime: MarketRegime::Bull,
                factor_scores: scores,
                factor_weights: FactorWeights(weights),
            },
        }
    }

    fn period(regime: MarketRegime, portfolio: f64, benchmark: f64) -> PeriodReturn {
        PeriodReturn {
            start: date(0),
            end: date(21),
            portfolio_return: portfolio,
            benchmark_return: benchmark,
            regime,
            positions: 3,
        }
    }

    #[test]
    fn shares_follow_weighted_scores() {
        let t = trade(110.0, [80.0, 40.0, 0.0, 0.0, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
        let shares = factor_shares(&t);
        assert_relative_eq!(shares[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(shares[1], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(shares.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_scores_fall_back_to_weights() {
        let t = trade(110.0, [0.0; 6], [0.2, 0.2, 0.2, 0.2, 0.1, 0.1]);
        assert_relative_eq!(factor_shares(&t)[4], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn factor_contributions_sum_to_weighted_return() {
        let trades = vec![
            trade(110.0, [70.0, 60.0, 80.0, 50.0, 55.0, 65.0], [0.2, 0.1, 0.3, 0.05, 0.2, 0.15]),
            trade(95.0, [50.0; 6], [1.0 / 6.0; 6]),
        ];
        let factors = attribute_factors(&trades);
        assert_eq!(factors.len(), 6);
        let total: f64 = factors.iter().map(|f| f.contribution).sum();
        assert_relative_eq!(total, 0.10 * 0.10 + 0.10 * -0.05, epsilon = 1e-12);
        let share_total: f64 = factors.iter().map(|f| f.average_share).sum();
        assert_relative_eq!(share_total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn regimes_group_periods() {
        let periods = vec![
            period(MarketRegime::Bull, 0.02, 0.01),
            period(MarketRegime::Bear, -0.01, -0.03),
            period(MarketRegime::Bull, 0.01, 0.02),
        ];
        let regimes = attribute_regimes(&periods);
        assert_eq!(regimes.len(), 2);
        let bull = &regimes[0];
        assert_eq!(bull.regime, MarketRegime::Bull);
        assert_eq!(bull.periods, 2);
        assert_relative_eq!(bull.mean_portfolio_return, 0.015, epsilon = 1e-12);
        assert_relative_eq!(bull.compounded_portfolio_return, 1.02 * 1.01 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(bull.hit_rate, 0.5);
        assert_relative_eq!(regimes[1].hit_rate, 1.0);
    }

    #[test]
    fn empty_inputs() {
        let report = attribute(&[], &[]);
        assert!(report.regimes.is_empty());
        assert!(report.factors.iter().all(|f| f.contribution == 0.0));
    }
}
