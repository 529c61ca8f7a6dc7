//! Engine and backtest configuration, read from a [`ConfigPort`].
//!
//! Every key is optional and falls back to the documented default. Keys:
//!
//! - `[scoring]` `differentiation_exponent`, `force_sequential`,
//!   `near_term_catalyst_days`
//! - `[regime]` `high_volatility_vix`, `bull_max_vix`, `bear_min_vix`,
//!   `average_period`
//! - `[weights]` `<regime>_<factor>`, `min_weight`, `max_weight`, `tolerance`
//! - `[horizon]` `<horizon>_<factor>`
//! - `[factors]` `<factor>_<component>`
//! - `[smart_money]` windows, half-lives, `min_cluster_buyers`,
//!   `default_fund_reputation`
//! - `[fund_reputation]` `<fund fragment> = <weight>`
//! - `[sector_rotation]` `<sector> = bull,bear,sideways,high_volatility`
//! - `[risk]`, `[sizing]`, `[portfolio]`, `[backtest]`

use tracing::info;

use super::aggregator::ScoringConfig;
use super::backtest::{BacktestConfig, RebalanceFrequency};
use super::config_validation::validate_engine_config;
use super::error::FactorlabError;
use super::factor::{FactorConfig, FactorKind};
use super::regime::{MarketRegime, RegimeConfig};
use super::risk::RiskFilterConfig;
use super::selection::PortfolioConstraints;
use super::sizing::SizingConfig;
use super::weights::{Horizon, WeightConfig};
use crate::ports::config_port::ConfigPort;

/// Everything the scoring pipeline needs, built once and passed down.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub regime: RegimeConfig,
    pub weights: WeightConfig,
    pub factors: FactorConfig,
    pub risk: RiskFilterConfig,
    pub sizing: SizingConfig,
    pub portfolio: PortfolioConstraints,
}

/// Read then validate.
pub fn load_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, FactorlabError> {
    let engine = build_engine_config(config)?;
    validate_engine_config(&engine)?;
    info!(
        funds = engine.factors.smart_money.fund_reputation.len(),
        sectors = engine.factors.catalyst.sector_rotation.entries().len(),
        "loaded engine config"
    );
    Ok(engine)
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, FactorlabError> {
    let mut engine = EngineConfig::default();
    read_scoring(config, &mut engine)?;
    read_regime(config, &mut engine.regime)?;
    read_weights(config, &mut engine.weights)?;
    read_factor_weights(config, &mut engine.factors)?;
    read_smart_money(config, &mut engine.factors)?;
    read_sector_rotation(config, &mut engine.factors)?;
    read_risk(config, &mut engine.risk)?;
    read_sizing(config, &mut engine.sizing)?;
    read_portfolio(config, &mut engine.portfolio)?;
    Ok(engine)
}

fn read_scoring(config: &dyn ConfigPort, engine: &mut EngineConfig) -> Result<(), FactorlabError> {
    let s = &mut engine.scoring;
    s.differentiation_exponent =
        config.get_double("scoring", "differentiation_exponent", s.differentiation_exponent)?;
    s.force_sequential = config.get_bool("scoring", "force_sequential", s.force_sequential)?;
    let catalyst = &mut engine.factors.catalyst;
    catalyst.near_term_days =
        config.get_int("scoring", "near_term_catalyst_days", catalyst.near_term_days)?;
    Ok(())
}

fn read_regime(config: &dyn ConfigPort, r: &mut RegimeConfig) -> Result<(), FactorlabError> {
    r.high_volatility_vix = config.get_double("regime", "high_volatility_vix", r.high_volatility_vix)?;
    r.bull_max_vix = config.get_double("regime", "bull_max_vix", r.bull_max_vix)?;
    r.bear_min_vix = config.get_double("regime", "bear_min_vix", r.bear_min_vix)?;
    r.average_period = config.get_count("regime", "average_period", r.average_period)?;
    Ok(())
}

fn read_weights(config: &dyn ConfigPort, w: &mut WeightConfig) -> Result<(), FactorlabError> {
    for regime in MarketRegime::ALL {
        for kind in FactorKind::ALL {
            let key = format!("{}_{}", regime.key(), kind.key());
            let slot = &mut w.base[regime.index()][kind.index()];
            *slot = config.get_double("weights", &key, *slot)?;
        }
    }
    for horizon in Horizon::ALL {
        for kind in FactorKind::ALL {
            let key = format!("{}_{}", horizon.key(), kind.key());
            let slot = &mut w.horizon_deltas[horizon.index()][kind.index()];
            *slot = config.get_double("horizon", &key, *slot)?;
        }
    }
    w.min_weight = config.get_double("weights", "min_weight", w.min_weight)?;
    w.max_weight = config.get_double("weights", "max_weight", w.max_weight)?;
    w.tolerance = config.get_double("weights", "tolerance", w.tolerance)?;
    Ok(())
}

fn read_factor_weights(config: &dyn ConfigPort, f: &mut FactorConfig) -> Result<(), FactorlabError> {
    let read = |key: &str, current: f64| config.get_double("factors", key, current);

    let q = &mut f.quality;
    q.gross_profitability = read("quality_gross_profitability", q.gross_profitability)?;
    q.roe = read("quality_roe", q.roe)?;
    q.debt_to_equity = read("quality_debt_to_equity", q.debt_to_equity)?;
    q.margin_stability = read("quality_margin_stability", q.margin_stability)?;

    let v = &mut f.value;
    v.fcf_yield = read("value_fcf_yield", v.fcf_yield)?;
    v.earnings_yield = read("value_earnings_yield", v.earnings_yield)?;
    v.book_to_price = read("value_book_to_price", v.book_to_price)?;

    let m = &mut f.momentum;
    m.momentum_12_1 = read("momentum_momentum_12_1", m.momentum_12_1)?;
    m.return_6m = read("momentum_return_6m", m.return_6m)?;
    m.up_volume = read("momentum_up_volume", m.up_volume)?;

    let l = &mut f.low_volatility;
    l.volatility = read("low_volatility_volatility", l.volatility)?;
    l.beta = read("low_volatility_beta", l.beta)?;
    l.max_drawdown = read("low_volatility_max_drawdown", l.max_drawdown)?;

    let s = &mut f.smart_money.weights;
    s.institutional = read("smart_money_institutional", s.institutional)?;
    s.insider = read("smart_money_insider", s.insider)?;
    s.legislator = read("smart_money_legislator", s.legislator)?;

    let c = &mut f.catalyst.weights;
    c.earnings_proximity = read("catalyst_earnings_proximity", c.earnings_proximity)?;
    c.sector_rotation = read("catalyst_sector_rotation", c.sector_rotation)?;
    Ok(())
}

fn read_smart_money(config: &dyn ConfigPort, f: &mut FactorConfig) -> Result<(), FactorlabError> {
    let s = &mut f.smart_money;
    s.insider_lookback_days = config.get_int("smart_money", "insider_lookback_days", s.insider_lookback_days)?;
    s.insider_half_life_days =
        config.get_double("smart_money", "insider_half_life_days", s.insider_half_life_days)?;
    s.min_cluster_buyers = config.get_count("smart_money", "min_cluster_buyers", s.min_cluster_buyers)?;
    s.legislator_lookback_days =
        config.get_int("smart_money", "legislator_lookback_days", s.legislator_lookback_days)?;
    s.legislator_half_life_days =
        config.get_double("smart_money", "legislator_half_life_days", s.legislator_half_life_days)?;
    s.default_fund_reputation =
        config.get_double("smart_money", "default_fund_reputation", s.default_fund_reputation)?;

    for (fund, _) in config.section_entries("fund_reputation") {
        let weight = config.get_double("fund_reputation", &fund, 0.0)?;
        let fragment = fund.trim().to_lowercase();
        match s.fund_reputation.iter_mut().find(|(name, _)| *name == fragment) {
            Some(entry) => entry.1 = weight,
            None => s.fund_reputation.push((fragment, weight)),
        }
    }
    Ok(())
}

fn read_sector_rotation(config: &dyn ConfigPort, f: &mut FactorConfig) -> Result<(), FactorlabError> {
    for (sector, raw) in config.section_entries("sector_rotation") {
        let scores = parse_regime_row(&raw)
            .ok_or_else(|| FactorlabError::invalid("sector_rotation", &sector, &raw, "expected four comma-separated numbers"))?;
        f.catalyst.sector_rotation.set(&sector, scores);
    }
    Ok(())
}

/// `"85, 30, 55, 35"` into a row indexed by [`MarketRegime::index`].
pub fn parse_regime_row(raw: &str) -> Option<[f64; 4]> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect::<Option<_>>()?;
    values.try_into().ok()
}

fn read_risk(config: &dyn ConfigPort, r: &mut RiskFilterConfig) -> Result<(), FactorlabError> {
    let min_conviction = config.get_count("risk", "min_conviction", r.min_conviction as usize)?;
    r.min_conviction = u8::try_from(min_conviction)
        .map_err(|_| FactorlabError::invalid("risk", "min_conviction", min_conviction, "must be between 1 and 10"))?;
    r.min_price = config.get_double("risk", "min_price", r.min_price)?;
    r.min_market_cap = config.get_double("risk", "min_market_cap", r.min_market_cap)?;
    r.min_avg_dollar_volume = config.get_double("risk", "min_avg_dollar_volume", r.min_avg_dollar_volume)?;
    r.max_days_to_cover = config.get_double("risk", "max_days_to_cover", r.max_days_to_cover)?;
    r.max_debt_to_equity = config.get_double("risk", "max_debt_to_equity", r.max_debt_to_equity)?;
    r.min_current_ratio = config.get_double("risk", "min_current_ratio", r.min_current_ratio)?;
    Ok(())
}

fn read_sizing(config: &dyn ConfigPort, s: &mut SizingConfig) -> Result<(), FactorlabError> {
    s.win_rate = config.get_double("sizing", "win_rate", s.win_rate)?;
    s.avg_win = config.get_double("sizing", "avg_win", s.avg_win)?;
    s.avg_loss = config.get_double("sizing", "avg_loss", s.avg_loss)?;
    s.safety_fraction = config.get_double("sizing", "safety_fraction", s.safety_fraction)?;
    s.min_position = config.get_double("sizing", "min_position", s.min_position)?;
    s.max_position = config.get_double("sizing", "max_position", s.max_position)?;
    Ok(())
}

fn read_portfolio(config: &dyn ConfigPort, p: &mut PortfolioConstraints) -> Result<(), FactorlabError> {
    p.max_per_sector_per_horizon =
        config.get_count("portfolio", "max_per_sector_per_horizon", p.max_per_sector_per_horizon)?;
    p.max_per_horizon = config.get_count("portfolio", "max_per_horizon", p.max_per_horizon)?;
    p.max_sector_exposure = config.get_double("portfolio", "max_sector_exposure", p.max_sector_exposure)?;
    p.min_positions = config.get_count("portfolio", "min_positions", p.min_positions)?;
    p.max_positions = config.get_count("portfolio", "max_positions", p.max_positions)?;
    Ok(())
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, FactorlabError> {
    let d = BacktestConfig::default();
    let rebalance = match config.get_string("backtest", "rebalance") {
        None => d.rebalance,
        Some(raw) => RebalanceFrequency::parse(&raw).ok_or_else(|| {
            FactorlabError::invalid("backtest", "rebalance", &raw, "expected daily, weekly, monthly or quarterly")
        })?,
    };
    let position_size_pct = match config.get_string("backtest", "position_size_pct") {
        Some(raw) if !raw.trim().is_empty() => Some(config.get_double("backtest", "position_size_pct", 0.0)?),
        _ => None,
    };

    Ok(BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", d.initial_capital)?,
        position_size_pct,
        commission_pct: config.get_double("backtest", "commission_pct", d.commission_pct)?,
        slippage_pct: config.get_double("backtest", "slippage_pct", d.slippage_pct)?,
        rebalance,
        warmup_bars: config.get_count("backtest", "warmup_bars", d.warmup_bars)?,
        start_date: config.get_date("backtest", "start_date")?,
        end_date: config.get_date("backtest", "end_date")?,
        allow_shorting: config.get_bool("backtest", "allow_shorting", d.allow_shorting)?,
        short_threshold: config.get_double("backtest", "short_threshold", d.short_threshold)?,
        risk_free_rate: config.get_double("backtest", "risk_free_rate", d.risk_free_rate)?,
        attribution: config.get_bool("backtest", "attribution", d.attribution)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapConfig(HashMap<String, HashMap<String, String>>);

    impl MapConfig {
        fn with(mut self, section: &str, key: &str, value: &str) -> Self {
            self.0
                .entry(section.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
            self
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(section).and_then(|s| s.get(key)).cloned()
        }

        fn section_entries(&self, section: &str) -> Vec<(String, String)> {
            let mut entries: Vec<_> = self
                .0
                .get(section)
                .map(|s| s.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            entries.sort();
            entries
        }
    }

    #[test]
    fn empty_config_gives_defaults() {
        let engine = build_engine_config(&MapConfig::default()).unwrap();
        assert_eq!(engine, EngineConfig::default());
        let backtest = build_backtest_config(&MapConfig::default()).unwrap();
        assert_eq!(backtest, BacktestConfig::default());
    }

    #[test]
    fn reads_overrides_across_sections() {
        let cfg = MapConfig::default()
            .with("scoring", "differentiation_exponent", "2.0")
            .with("scoring", "near_term_catalyst_days", "7")
            .with("regime", "high_volatility_vix", "28")
            .with("weights", "bull_momentum", "0.25")
            .with("horizon", "short_catalyst", "0.04")
            .with("factors", "value_fcf_yield", "0.5")
            .with("risk", "min_conviction", "6")
            .with("portfolio", "max_positions", "12");
        let engine = build_engine_config(&cfg).unwrap();
        assert_eq!(engine.scoring.differentiation_exponent, 2.0);
        assert_eq!(engine.factors.catalyst.near_term_days, 7);
        assert_eq!(engine.regime.high_volatility_vix, 28.0);
        assert_eq!(
            engine.weights.base_weight(MarketRegime::Bull, FactorKind::Momentum),
            0.25
        );
        assert_eq!(engine.weights.delta(Horizon::Short, FactorKind::Catalyst), 0.04);
        assert_eq!(engine.factors.value.fcf_yield, 0.5);
        assert_eq!(engine.risk.min_conviction, 6);
        assert_eq!(engine.portfolio.max_positions, 12);
    }

    #[test]
    fn fund_reputation_overrides_and_extends() {
        let cfg = MapConfig::default()
            .with("fund_reputation", "Baupost", "0.7")
            .with("fund_reputation", "greenlight", "0.8");
        let engine = build_engine_config(&cfg).unwrap();
        let sm = &engine.factors.smart_money;
        assert_eq!(sm.reputation("The Baupost Group"), 0.7);
        assert_eq!(sm.reputation("Greenlight Capital"), 0.8);
    }

    #[test]
    fn sector_rotation_rows() {
        let cfg = MapConfig::default().with("sector_rotation", "Semiconductors", "90, 20, 50, 30");
        let engine = build_engine_config(&cfg).unwrap();
        let table = &engine.factors.catalyst.sector_rotation;
        assert_eq!(table.get("semiconductors", MarketRegime::Bear), Some(20.0));

        let bad = MapConfig::default().with("sector_rotation", "Energy", "90,20");
        let err = build_engine_config(&bad).unwrap_err();
        assert!(matches!(err, FactorlabError::ConfigInvalid { ref key, .. } if key == "Energy"));
    }

    #[test]
    fn non_numeric_value_names_section_and_key() {
        let cfg = MapConfig::default().with("sizing", "win_rate", "lots");
        let err = build_engine_config(&cfg).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config value [sizing] win_rate = lots: expected a number"
        );
    }

    #[test]
    fn backtest_section() {
        let cfg = MapConfig::default()
            .with("backtest", "rebalance", "Weekly")
            .with("backtest", "position_size_pct", "5")
            .with("backtest", "allow_shorting", "yes")
            .with("backtest", "start_date", "2020-01-01");
        let bt = build_backtest_config(&cfg).unwrap();
        assert_eq!(bt.rebalance, RebalanceFrequency::Weekly);
        assert_eq!(bt.position_size_pct, Some(5.0));
        assert!(bt.allow_shorting);
        assert_eq!(bt.start_date, chrono::NaiveDate::from_ymd_opt(2020, 1, 1));

        let bad = MapConfig::default().with("backtest", "rebalance", "hourly");
        assert!(build_backtest_config(&bad).is_err());
    }

    #[test]
    fn regime_rows_parse() {
        assert_eq!(parse_regime_row("1,2,3,4"), Some([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(parse_regime_row("1,2,x,4"), None);
        assert_eq!(parse_regime_row("1,2,3,4,5"), None);
    }
}
