//! Backtest simulator.
//!
//! Replays the live pipeline over history. On each rebalance boundary the
//! simulator builds point-in-time inputs for every ticker, detects the
//! regime, scores, selects and moves each ticker's position state between
//! Flat, Long and Short. Equity compounds once per period between
//! boundaries; anything still open is closed on the final bar.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::aggregator::{EnhancedScore, score_batch};
use super::attribution::{AttributionReport, attribute};
use super::config::EngineConfig;
use super::error::FactorlabError;
use super::execution::{ExecutionConfig, entry_fill, exit_fill, leg_cost_fraction, round_trip_cost};
use super::factor::ScoringContext;
use super::factor::catalyst::normalize_sector;
use super::history::{TickerHistory, build_unified_timeline};
use super::metrics::Metrics;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{BacktestTrade, Direction, EntrySignal, OpenPosition, PositionState};
use super::regime::{MarketRegime, RegimeInputs, detect_regime};
use super::selection::{PortfolioSelection, select_portfolio};
use super::sizing::compute_position_size;
use super::stats::TRADING_DAYS_PER_YEAR;

/// Trailing window for sector-versus-benchmark momentum.
pub const SECTOR_MOMENTUM_BARS: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebalanceFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl RebalanceFrequency {
    pub fn bars(self) -> usize {
        match self {
            RebalanceFrequency::Daily => 1,
            RebalanceFrequency::Weekly => 5,
            RebalanceFrequency::Monthly => 21,
            RebalanceFrequency::Quarterly => 63,
        }
    }

    pub fn periods_per_year(self) -> f64 {
        TRADING_DAYS_PER_YEAR / self.bars() as f64
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Some(RebalanceFrequency::Daily),
            "weekly" => Some(RebalanceFrequency::Weekly),
            "monthly" => Some(RebalanceFrequency::Monthly),
            "quarterly" => Some(RebalanceFrequency::Quarterly),
            _ => None,
        }
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebalanceFrequency::Daily => "daily",
            RebalanceFrequency::Weekly => "weekly",
            RebalanceFrequency::Monthly => "monthly",
            RebalanceFrequency::Quarterly => "quarterly",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fixed position size in percent of equity. When absent, longs use the
    /// Kelly size from scoring.
    pub position_size_pct: Option<f64>,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub rebalance: RebalanceFrequency,
    /// Bars of history skipped before the first rebalance.
    pub warmup_bars: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub allow_shorting: bool,
    /// Differentiated score at or below which a ticker is shorted.
    pub short_threshold: f64,
    /// Annual rate.
    pub risk_free_rate: f64,
    pub attribution: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            position_size_pct: None,
            commission_pct: 0.1,
            slippage_pct: 0.05,
            rebalance: RebalanceFrequency::Monthly,
            warmup_bars: 200,
            start_date: None,
            end_date: None,
            allow_shorting: false,
            short_threshold: 30.0,
            risk_free_rate: 0.02,
            attribution: false,
        }
    }
}

impl BacktestConfig {
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

/// Everything the simulator replays.
#[derive(Debug, Clone)]
pub struct BacktestData {
    pub histories: Vec<TickerHistory>,
    pub benchmark: TickerHistory,
    /// Volatility index closes, oldest first.
    pub volatility_index: Vec<(NaiveDate, f64)>,
}

impl BacktestData {
    pub fn new(histories: Vec<TickerHistory>, benchmark: TickerHistory) -> Self {
        BacktestData {
            histories,
            benchmark,
            volatility_index: Vec::new(),
        }
    }

    pub fn with_volatility_index(mut self, mut series: Vec<(NaiveDate, f64)>) -> Self {
        series.sort_by_key(|(d, _)| *d);
        self.volatility_index = series;
        self
    }

    pub fn volatility_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let end = self.volatility_index.partition_point(|(d, _)| *d <= date);
        end.checked_sub(1).map(|i| self.volatility_index[i].1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReturn {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    /// Regime detected at the start of the period.
    pub regime: MarketRegime,
    pub positions: usize,
}

impl PeriodReturn {
    pub fn excess_return(&self) -> f64 {
        self.portfolio_return - self.benchmark_return
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub periods: Vec<PeriodReturn>,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_capital: f64,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
    pub attribution: Option<AttributionReport>,
}

impl BacktestResult {
    pub fn total_return(&self) -> f64 {
        compound(self.periods.iter().map(|p| p.portfolio_return))
    }

    pub fn benchmark_return(&self) -> f64 {
        compound(self.periods.iter().map(|p| p.benchmark_return))
    }

    pub fn alpha(&self) -> f64 {
        self.total_return() - self.benchmark_return()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::compute(self)
    }
}

/// `prod(1 + r) - 1`.
pub fn compound(returns: impl IntoIterator<Item = f64>) -> f64 {
    returns.into_iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Timeline indices at which the portfolio is rebalanced; the last entry is
/// the final bar, where open positions close.
pub fn rebalance_boundaries(timeline: &[NaiveDate], config: &BacktestConfig) -> Vec<usize> {
    let window_start = config
        .start_date
        .map_or(0, |s| timeline.partition_point(|d| *d < s));
    let window_end = config
        .end_date
        .map_or(timeline.len(), |e| timeline.partition_point(|d| *d <= e));
    let Some(last) = window_end.checked_sub(1) else {
        return Vec::new();
    };
    let first = window_start.max(config.warmup_bars);
    if first >= last {
        return Vec::new();
    }
    let mut boundaries: Vec<usize> = (first..last).step_by(config.rebalance.bars()).collect();
    boundaries.push(last);
    boundaries
}

/// Mean trailing return of each sector's tickers minus the benchmark's, keyed
/// by normalized sector so aliases pool into one mean.
pub fn sector_momentum(data: &BacktestData, date: NaiveDate) -> HashMap<String, f64> {
    let trailing = |bars: &[super::ohlcv::OhlcvBar]| -> Option<f64> {
        if bars.len() <= SECTOR_MOMENTUM_BARS {
            return None;
        }
        let last = bars[bars.len() - 1].close;
        let first = bars[bars.len() - 1 - SECTOR_MOMENTUM_BARS].close;
        if first > 0.0 { Some(last / first - 1.0) } else { None }
    };
    let Some(benchmark) = trailing(data.benchmark.bars_until(date)) else {
        return HashMap::new();
    };

    let mut by_sector: HashMap<String, (f64, usize)> = HashMap::new();
    for history in &data.histories {
        let (Some(sector), Some(r)) = (history.sector.as_ref(), trailing(history.bars_until(date))) else {
            continue;
        };
        let entry = by_sector.entry(normalize_sector(sector)).or_insert((0.0, 0));
        entry.0 += r;
        entry.1 += 1;
    }
    by_sector
        .into_iter()
        .map(|(sector, (sum, n))| (sector, sum / n as f64 - benchmark))
        .collect()
}

/// Regime, benchmark series and sector momentum as of `date`.
pub fn scoring_context(data: &BacktestData, engine: &EngineConfig, date: NaiveDate) -> ScoringContext {
    let benchmark = data.benchmark.bars_until(date).to_vec();
    let inputs = RegimeInputs::from_history(
        &benchmark,
        data.volatility_on_or_before(date),
        engine.regime.average_period,
    );
    let regime = detect_regime(&inputs, &engine.regime);
    sector_momentum(data, date)
        .into_iter()
        .fold(
            ScoringContext::new(regime).with_benchmark(benchmark),
            |ctx, (sector, relative)| ctx.with_sector_momentum(&sector, relative),
        )
}

fn entry_signal(score: &EnhancedScore) -> EntrySignal {
    EntrySignal {
        score: score.score,
        conviction: score.conviction,
        horizon: score.horizon,
        sector: score.sector.clone(),
        regime: score.regime,
        factor_scores: score.factors.each_ref().map(|f| f.score),
        factor_weights: score.weights,
    }
}

struct Simulation<'a> {
    data: &'a BacktestData,
    engine: &'a EngineConfig,
    config: &'a BacktestConfig,
    execution: ExecutionConfig,
    by_ticker: HashMap<&'a str, &'a TickerHistory>,
    portfolio: Portfolio,
}

impl<'a> Simulation<'a> {
    fn close_on_or_before(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.by_ticker
            .get(ticker)
            .and_then(|h| h.close_on_or_before(date))
    }

    fn target_state(&self, score: &EnhancedScore, selection: &PortfolioSelection) -> PositionState {
        if selection.contains(&score.ticker) {
            PositionState::Long
        } else if self.config.allow_shorting && score.score <= self.config.short_threshold {
            PositionState::Short
        } else {
            PositionState::Flat
        }
    }

    fn position_weight(&self, score: &EnhancedScore, direction: Direction) -> f64 {
        if let Some(pct) = self.config.position_size_pct {
            return pct / 100.0;
        }
        match direction {
            Direction::Long => score.position_size,
            // Mirror the conviction scale: the weakest score is the strongest short.
            Direction::Short => {
                let short_conviction = 11u8.saturating_sub(score.conviction).clamp(1, 10);
                compute_position_size(&score.ticker, short_conviction, &self.engine.sizing).final_fraction
            }
        }
    }

    /// Close `ticker` at the `date` close. Returns the cost charged to the
    /// period as a fraction of equity.
    fn close_position(&mut self, ticker: &str, date: NaiveDate) -> f64 {
        let Some(position) = self.portfolio.remove_position(ticker) else {
            return 0.0;
        };
        let exit_price = self
            .close_on_or_before(ticker, date)
            .unwrap_or(position.entry_price);
        let benchmark_exit = self
            .data
            .benchmark
            .close_on_or_before(date)
            .unwrap_or(position.benchmark_entry);
        let trade = BacktestTrade {
            ticker: position.ticker,
            direction: position.direction,
            weight: position.weight,
            entry_date: position.entry_date,
            exit_date: date,
            entry_price: position.entry_price,
            exit_price,
            entry_fill: position.entry_fill,
            exit_fill: exit_fill(position.direction, exit_price, &self.execution),
            benchmark_entry: position.benchmark_entry,
            benchmark_exit,
            cost: round_trip_cost(position.direction, position.entry_price, exit_price, &self.execution),
            signal: position.signal,
        };
        debug!(
            ticker = %trade.ticker,
            direction = ?trade.direction,
            net_return = trade.net_return(),
            "closed position"
        );
        self.portfolio.record_trade(trade);
        position.weight * leg_cost_fraction(&self.execution)
    }

    fn open_position(&mut self, score: &EnhancedScore, direction: Direction, date: NaiveDate) -> f64 {
        let weight = self.position_weight(score, direction);
        let (Some(entry_price), Some(benchmark_entry)) = (
            self.close_on_or_before(&score.ticker, date),
            self.data.benchmark.close_on_or_before(date),
        ) else {
            return 0.0;
        };
        if weight <= 0.0 || entry_price <= 0.0 {
            return 0.0;
        }
        self.portfolio.add_position(OpenPosition {
            ticker: score.ticker.clone(),
            direction,
            weight,
            entry_date: date,
            entry_price,
            entry_fill: entry_fill(direction, entry_price, &self.execution),
            benchmark_entry,
            signal: entry_signal(score),
        });
        weight * leg_cost_fraction(&self.execution)
    }

    /// Move every ticker to its target state. Returns the period cost.
    fn rebalance(&mut self, scores: &[EnhancedScore], selection: &PortfolioSelection, date: NaiveDate) -> f64 {
        let targets: HashMap<&str, PositionState> = scores
            .iter()
            .map(|s| (s.ticker.as_str(), self.target_state(s, selection)))
            .collect();

        let mut cost = 0.0;
        let open: Vec<String> = self.portfolio.positions.keys().cloned().collect();
        for ticker in open {
            let target = targets
                .get(ticker.as_str())
                .copied()
                .unwrap_or(PositionState::Flat);
            if self.portfolio.state(&ticker) != target {
                cost += self.close_position(&ticker, date);
            }
        }

        for score in scores {
            let target = targets
                .get(score.ticker.as_str())
                .copied()
                .unwrap_or(PositionState::Flat);
            if let Some(direction) = target.direction() {
                if self.portfolio.state(&score.ticker) == PositionState::Flat {
                    cost += self.open_position(score, direction, date);
                }
            }
        }
        cost
    }

    fn held_return(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        self.portfolio
            .positions
            .values()
            .filter_map(|p| {
                let from = self.close_on_or_before(&p.ticker, start)?;
                let to = self.close_on_or_before(&p.ticker, end)?;
                Some(p.weight * p.direction.price_return(from, to))
            })
            .sum()
    }

    fn close_all(&mut self, date: NaiveDate) -> f64 {
        let open: Vec<String> = self.portfolio.positions.keys().cloned().collect();
        open.iter().map(|t| self.close_position(t, date)).sum()
    }
}

pub fn run_backtest(
    data: &BacktestData,
    engine: &EngineConfig,
    config: &BacktestConfig,
) -> Result<BacktestResult, FactorlabError> {
    if data.benchmark.bars.is_empty() {
        return Err(FactorlabError::NoData {
            ticker: data.benchmark.ticker.clone(),
        });
    }
    let timeline: Vec<NaiveDate> = build_unified_timeline(&data.histories)
        .into_iter()
        .filter(|d| data.benchmark.get_bar(*d).is_some())
        .collect();
    let boundaries = rebalance_boundaries(&timeline, config);
    if boundaries.len() < 2 {
        return Err(FactorlabError::InsufficientData {
            ticker: data.benchmark.ticker.clone(),
            bars: timeline.len(),
            minimum: config.warmup_bars + 2,
        });
    }

    let mut sim = Simulation {
        data,
        engine,
        config,
        execution: config.execution(),
        by_ticker: data.histories.iter().map(|h| (h.ticker.as_str(), h)).collect(),
        portfolio: Portfolio::new(config.initial_capital),
    };
    sim.portfolio
        .record_equity(timeline[boundaries[0]], config.initial_capital);

    info!(
        tickers = data.histories.len(),
        bars = timeline.len(),
        rebalances = boundaries.len() - 1,
        frequency = %config.rebalance,
        "starting backtest"
    );

    let last_boundary = boundaries[boundaries.len() - 1];
    let mut periods = Vec::with_capacity(boundaries.len() - 1);

    for pair in boundaries.windows(2) {
        let (start, end) = (timeline[pair[0]], timeline[pair[1]]);
        let ctx = scoring_context(data, engine, start);
        let regime = ctx.regime.regime;

        let inputs: Vec<_> = data
            .histories
            .iter()
            .filter(|h| !h.bars_until(start).is_empty())
            .map(|h| h.input_at(start))
            .collect();
        let scores = score_batch(&inputs, &ctx, engine);
        let selection = select_portfolio(&scores, &engine.portfolio);

        let mut cost = sim.rebalance(&scores, &selection, start);
        let positions = sim.portfolio.position_count();
        let gross = sim.held_return(start, end);
        if pair[1] == last_boundary {
            cost += sim.close_all(end);
        }

        let benchmark_return = match (
            data.benchmark.close_on_or_before(start),
            data.benchmark.close_on_or_before(end),
        ) {
            (Some(from), Some(to)) => Direction::Long.price_return(from, to),
            _ => 0.0,
        };
        let portfolio_return = gross - cost;
        sim.portfolio.apply_return(end, portfolio_return);

        debug!(
            %start,
            %regime,
            positions,
            portfolio_return,
            benchmark_return,
            "period"
        );
        periods.push(PeriodReturn {
            start,
            end,
            portfolio_return,
            benchmark_return,
            regime,
            positions,
        });
    }

    let trades = std::mem::take(&mut sim.portfolio.closed_trades);
    let attribution = config.attribution.then(|| attribute(&trades, &periods));
    let result = BacktestResult {
        periods,
        trades,
        equity_curve: std::mem::take(&mut sim.portfolio.equity_curve),
        initial_capital: config.initial_capital,
        periods_per_year: config.rebalance.periods_per_year(),
        risk_free_rate: config.risk_free_rate,
        attribution,
    };

    info!(
        trades = result.trades.len(),
        total_return = result.total_return(),
        benchmark_return = result.benchmark_return(),
        "backtest complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;

    fn bars(ticker: &str, closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                ticker: ticker.into(),
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000_000,
            })
            .collect()
    }

    fn timeline(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n as i64).map(|i| start + chrono::Duration::days(i)).collect()
    }

    #[test]
    fn frequencies() {
        assert_eq!(RebalanceFrequency::Weekly.bars(), 5);
        assert_eq!(RebalanceFrequency::Quarterly.bars(), 63);
        assert_relative_eq!(RebalanceFrequency::Monthly.periods_per_year(), 12.0);
        assert_eq!(RebalanceFrequency::parse(" Monthly "), Some(RebalanceFrequency::Monthly));
        assert_eq!(RebalanceFrequency::parse("hourly"), None);
    }

    #[test]
    fn boundaries_respect_warmup_and_step() {
        let config = BacktestConfig {
            warmup_bars: 10,
            rebalance: RebalanceFrequency::Weekly,
            ..Default::default()
        };
        assert_eq!(rebalance_boundaries(&timeline(30), &config), vec![10, 15, 20, 25, 29]);
    }

    #[test]
    fn boundaries_respect_date_window() {
        let dates = timeline(60);
        let config = BacktestConfig {
            warmup_bars: 5,
            rebalance: RebalanceFrequency::Weekly,
            start_date: Some(dates[20]),
            end_date: Some(dates[40]),
            ..Default::default()
        };
        assert_eq!(rebalance_boundaries(&dates, &config), vec![20, 25, 30, 35, 40]);
    }

    #[test]
    fn too_short_history_has_no_boundaries() {
        let config = BacktestConfig {
            warmup_bars: 50,
            ..Default::default()
        };
        assert!(rebalance_boundaries(&timeline(40), &config).is_empty());
    }

    #[test]
    fn compound_returns() {
        assert_relative_eq!(compound([0.10, -0.10]), -0.01, epsilon = 1e-12);
        assert_relative_eq!(compound(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn volatility_lookup_carries_forward() {
        let dates = timeline(5);
        let data = BacktestData::new(Vec::new(), TickerHistory::new("SPY", bars("SPY", &[1.0; 5])))
            .with_volatility_index(vec![(dates[3], 22.0), (dates[1], 18.0)]);
        assert_eq!(data.volatility_on_or_before(dates[0]), None);
        assert_eq!(data.volatility_on_or_before(dates[2]), Some(18.0));
        assert_eq!(data.volatility_on_or_before(dates[4]), Some(22.0));
    }

    #[test]
    fn missing_benchmark_is_an_error() {
        let data = BacktestData::new(
            vec![TickerHistory::new("AAA", bars("AAA", &[10.0; 30]))],
            TickerHistory::new("SPY", Vec::new()),
        );
        let err = run_backtest(&data, &EngineConfig::default(), &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, FactorlabError::NoData { .. }));
    }

    #[test]
    fn short_history_is_insufficient() {
        let data = BacktestData::new(
            vec![TickerHistory::new("AAA", bars("AAA", &[10.0; 30]))],
            TickerHistory::new("SPY", bars("SPY", &[400.0; 30])),
        );
        let err = run_backtest(&data, &EngineConfig::default(), &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, FactorlabError::InsufficientData { bars: 30, .. }));
    }

    #[test]
    fn sector_momentum_relative_to_benchmark() {
        let n = SECTOR_MOMENTUM_BARS + 1;
        let rising: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * (10.0 / (n - 1) as f64)).collect();
        let flat = vec![100.0; n];
        let data = BacktestData::new(
            vec![
                TickerHistory::new("UP", bars("UP", &rising)).with_sector("Energy"),
                TickerHistory::new("FLAT", bars("FLAT", &flat)).with_sector("Utilities"),
            ],
            TickerHistory::new("SPY", bars("SPY", &flat)),
        );
        let date = timeline(n)[n - 1];
        let momentum = sector_momentum(&data, date);
        assert_relative_eq!(momentum["energy"], 0.10, epsilon = 1e-9);
        assert_relative_eq!(momentum["utilities"], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn sector_aliases_pool_into_one_mean() {
        let n = SECTOR_MOMENTUM_BARS + 1;
        let rising: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * (20.0 / (n - 1) as f64)).collect();
        let flat = vec![100.0; n];
        let data = BacktestData::new(
            vec![
                TickerHistory::new("UP", bars("UP", &rising)).with_sector("Tech"),
                TickerHistory::new("FLAT", bars("FLAT", &flat)).with_sector("Information Technology"),
            ],
            TickerHistory::new("SPY", bars("SPY", &flat)),
        );
        let date = timeline(n)[n - 1];
        let momentum = sector_momentum(&data, date);
        assert_eq!(momentum.len(), 1);
        assert_relative_eq!(momentum["technology"], 0.10, epsilon = 1e-9);

        let engine = EngineConfig::default();
        let first = scoring_context(&data, &engine, date);
        for _ in 0..50 {
            assert_eq!(scoring_context(&data, &engine, date), first);
        }
    }
}
