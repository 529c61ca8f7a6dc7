//! CLI definition and dispatch.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::aggregator::{EnhancedScore, score_batch};
use crate::domain::backtest::{BacktestConfig, BacktestData, BacktestResult, run_backtest, scoring_context};
use crate::domain::config::{EngineConfig, build_backtest_config, load_engine_config};
use crate::domain::config_validation::validate_backtest_config;
use crate::domain::error::FactorlabError;
use crate::domain::history::TickerHistory;
use crate::domain::regime::{RegimeContext, RegimeInputs, detect_regime};
use crate::domain::selection::{PortfolioSelection, select_portfolio};
use crate::domain::universe::{load_universe, parse_sector_map, parse_tickers};
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "factorlab", about = "Regime-aware multi-factor scoring and backtesting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Directory of per-ticker CSV files
    #[arg(long)]
    pub data: PathBuf,
    /// Comma-separated tickers; defaults to every price file in the directory
    #[arg(long)]
    pub tickers: Option<String>,
    #[arg(long, default_value = "SPY")]
    pub benchmark: String,
    /// Volatility index price file
    #[arg(long, default_value = "VIX")]
    pub vix: String,
    /// Comma-separated TICKER=Sector pairs
    #[arg(long)]
    pub sectors: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a configuration file without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Classify the market regime from benchmark price, average and volatility index
    Regime {
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        average: Option<f64>,
        #[arg(long)]
        vix: Option<f64>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Score and select a universe as of one date
    Score {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        data: DataArgs,
        /// Defaults to the last benchmark date
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Replay the scoring pipeline over history
    Backtest {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        data: DataArgs,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Validate { config } => run_validate(&config),
        Command::Regime {
            price,
            average,
            vix,
            config,
        } => run_regime(price, average, vix, config.as_deref()),
        Command::Score { config, data, as_of } => run_score(config.as_deref(), &data, as_of),
        Command::Backtest { config, data } => run_backtest_command(config.as_deref(), &data),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Engine and backtest configuration from `path`, or the defaults.
pub fn load_configs(path: Option<&Path>) -> Result<(EngineConfig, BacktestConfig), FactorlabError> {
    let Some(path) = path else {
        return Ok((EngineConfig::default(), BacktestConfig::default()));
    };
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    let engine = load_engine_config(&adapter)?;
    let backtest = build_backtest_config(&adapter)?;
    validate_backtest_config(&backtest)?;
    Ok((engine, backtest))
}

fn run_validate(path: &Path) -> Result<(), FactorlabError> {
    load_configs(Some(path))?;
    println!("{}: OK", path.display());
    Ok(())
}

fn run_regime(
    price: Option<f64>,
    average: Option<f64>,
    vix: Option<f64>,
    config: Option<&Path>,
) -> Result<(), FactorlabError> {
    let (engine, _) = load_configs(config)?;
    let inputs = RegimeInputs {
        benchmark_price: price,
        benchmark_average: average,
        volatility_index: vix,
    };
    print!("{}", format_regime(&detect_regime(&inputs, &engine.regime)));
    Ok(())
}

pub fn format_regime(ctx: &RegimeContext) -> String {
    format!(
        "Regime:     {}\nConfidence: {:.0}%\n{}\n",
        ctx.regime,
        ctx.confidence * 100.0,
        ctx.description
    )
}

/// Universe, benchmark and volatility index read through `port`.
pub fn load_backtest_data(port: &dyn MarketDataPort, args: &DataArgs) -> Result<BacktestData, FactorlabError> {
    let benchmark = args.benchmark.to_uppercase();
    let vix = args.vix.to_uppercase();
    let tickers = match &args.tickers {
        Some(list) => parse_tickers(list)?,
        None => port
            .list_tickers()?
            .into_iter()
            .filter(|t| *t != benchmark && *t != vix)
            .collect(),
    };
    let sectors = match &args.sectors {
        Some(pairs) => parse_sector_map(pairs)?,
        None => HashMap::new(),
    };

    let universe = load_universe(port, &tickers, &sectors)?;
    let benchmark_history = TickerHistory::new(benchmark.clone(), port.fetch_bars(&benchmark)?);
    let volatility_index = match port.fetch_bars(&vix) {
        Ok(bars) => bars.into_iter().map(|b| (b.date, b.close)).collect(),
        Err(e) => {
            warn!(ticker = %vix, error = %e, "no volatility index; regime rules that need it will not fire");
            Vec::new()
        }
    };

    Ok(BacktestData::new(universe.histories, benchmark_history).with_volatility_index(volatility_index))
}

fn run_score(config: Option<&Path>, args: &DataArgs, as_of: Option<NaiveDate>) -> Result<(), FactorlabError> {
    let (engine, _) = load_configs(config)?;
    let data = load_backtest_data(&CsvAdapter::new(args.data.clone()), args)?;
    let as_of = match as_of.or_else(|| data.benchmark.bars.last().map(|b| b.date)) {
        Some(date) => date,
        None => {
            return Err(FactorlabError::NoData {
                ticker: data.benchmark.ticker.clone(),
            });
        }
    };

    let ctx = scoring_context(&data, &engine, as_of);
    let inputs: Vec<_> = data.histories.iter().map(|h| h.input_at(as_of)).collect();
    let scores = score_batch(&inputs, &ctx, &engine);
    let selection = select_portfolio(&scores, &engine.portfolio);

    println!("As of {as_of}");
    print!("{}", format_regime(&ctx.regime));
    print!("{}", format_scores(&scores, &selection));
    Ok(())
}

pub fn format_scores(scores: &[EnhancedScore], selection: &PortfolioSelection) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{:<4} {:<8} {:>6} {:>4} {:<7} {:>6} {:>5}  STATUS",
        "RANK", "TICKER", "SCORE", "CONV", "HORIZON", "SIZE", "DATA"
    );
    for (rank, s) in scores.iter().enumerate() {
        let status = if selection.contains(&s.ticker) {
            "selected".to_string()
        } else if let Some(reason) = s.risk.reason() {
            reason.to_string()
        } else {
            "passed".to_string()
        };
        let _ = writeln!(
            out,
            "{:<4} {:<8} {:>6.1} {:>4} {:<7} {:>5.1}% {:>4.0}%  {}",
            rank + 1,
            s.ticker,
            s.score,
            s.conviction,
            s.horizon.to_string(),
            s.position_size * 100.0,
            s.completeness * 100.0,
            status
        );
    }
    let _ = writeln!(
        out,
        "\nSelected {} positions, {:.1}% of equity",
        selection.picks.len(),
        selection.total_exposure() * 100.0
    );
    if selection.shortfall > 0 {
        let _ = writeln!(out, "Shortfall: {} below the minimum position count", selection.shortfall);
    }
    out
}

fn run_backtest_command(config: Option<&Path>, args: &DataArgs) -> Result<(), FactorlabError> {
    let (engine, backtest) = load_configs(config)?;
    let data = load_backtest_data(&CsvAdapter::new(args.data.clone()), args)?;
    let result = run_backtest(&data, &engine, &backtest)?;
    print!("{}", format_backtest(&result));
    Ok(())
}

pub fn format_backtest(result: &BacktestResult) -> String {
    let m = result.metrics();
    let mut out = String::new();
    let _ = writeln!(out, "=== Backtest Results ===");
    if let (Some(first), Some(last)) = (result.periods.first(), result.periods.last()) {
        let _ = writeln!(out, "Period:           {} to {}", first.start, last.end);
    }
    let _ = writeln!(out, "Rebalances:       {}", m.periods);
    let _ = writeln!(out, "Total Return:     {:.2}%", m.total_return * 100.0);
    let _ = writeln!(out, "Benchmark Return: {:.2}%", m.benchmark_return * 100.0);
    let _ = writeln!(out, "Alpha:            {:.2}%", m.alpha * 100.0);
    let _ = writeln!(out, "Annualized:       {:.2}%", m.annualized_return * 100.0);
    let _ = writeln!(out, "Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    let _ = writeln!(out, "Sortino Ratio:    {:.2}", m.sortino_ratio);
    let _ = writeln!(out, "Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    let _ = writeln!(out, "Final Equity:     {:.2}", result.final_equity());
    let _ = writeln!(out, "Trades:           {}", result.trades.len());
    let _ = writeln!(out, "Win Rate:         {:.1}%", m.win_rate * 100.0);
    let _ = writeln!(out, "Profit Factor:    {:.2}", m.profit_factor);

    if let Some(attribution) = &result.attribution {
        let _ = writeln!(out, "\n=== Factor Attribution ===");
        for f in &attribution.factors {
            let _ = writeln!(
                out,
                "  {:<15} {:>+8.3}%  (avg share {:.1}%)",
                f.kind.to_string(),
                f.contribution * 100.0,
                f.average_share * 100.0
            );
        }
        let _ = writeln!(out, "\n=== Regime Attribution ===");
        for r in &attribution.regimes {
            let _ = writeln!(
                out,
                "  {:<15} {:>3} periods  portfolio {:>+7.2}%  benchmark {:>+7.2}%  hit rate {:.0}%",
                r.regime.to_string(),
                r.periods,
                r.compounded_portfolio_return * 100.0,
                r.compounded_benchmark_return * 100.0,
                r.hit_rate * 100.0
            );
        }
    }
    out
}
