//! Configuration validation.
//!
//! Runs once after the config is read and before anything is scored. The
//! first violation is returned with the section, key and offending value.

use super::backtest::BacktestConfig;
use super::config::EngineConfig;
use super::error::FactorlabError;
use super::factor::FactorKind;
use super::regime::MarketRegime;
use super::weights::Horizon;

pub fn validate_engine_config(config: &EngineConfig) -> Result<(), FactorlabError> {
    validate_scoring(config)?;
    validate_regime(config)?;
    validate_weight_band(config)?;
    validate_base_weights(config)?;
    validate_horizon_deltas(config)?;
    validate_factor_weights(config)?;
    validate_smart_money(config)?;
    validate_catalyst(config)?;
    validate_risk(config)?;
    validate_sizing(config)?;
    validate_portfolio(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), FactorlabError> {
    if config.initial_capital <= 0.0 {
        return Err(FactorlabError::invalid(
            "backtest",
            "initial_capital",
            config.initial_capital,
            "must be positive",
        ));
    }
    if let Some(pct) = config.position_size_pct {
        if pct <= 0.0 || pct > 100.0 {
            return Err(FactorlabError::invalid(
                "backtest",
                "position_size_pct",
                pct,
                "must be in (0, 100]",
            ));
        }
    }
    non_negative("backtest", "commission_pct", config.commission_pct)?;
    non_negative("backtest", "slippage_pct", config.slippage_pct)?;
    if !(0.0..1.0).contains(&config.risk_free_rate) {
        return Err(FactorlabError::invalid(
            "backtest",
            "risk_free_rate",
            config.risk_free_rate,
            "must be in [0, 1)",
        ));
    }
    in_range("backtest", "short_threshold", config.short_threshold, 0.0, 100.0)?;
    if let (Some(start), Some(end)) = (config.start_date, config.end_date) {
        if start >= end {
            return Err(FactorlabError::invalid(
                "backtest",
                "start_date",
                start,
                "must be before end_date",
            ));
        }
    }
    Ok(())
}

fn non_negative(section: &str, key: &str, value: f64) -> Result<(), FactorlabError> {
    if value < 0.0 {
        return Err(FactorlabError::invalid(section, key, value, "must be non-negative"));
    }
    Ok(())
}

fn positive(section: &str, key: &str, value: f64) -> Result<(), FactorlabError> {
    if value <= 0.0 {
        return Err(FactorlabError::invalid(section, key, value, "must be positive"));
    }
    Ok(())
}

fn in_range(section: &str, key: &str, value: f64, min: f64, max: f64) -> Result<(), FactorlabError> {
    if value < min || value > max {
        return Err(FactorlabError::invalid(
            section,
            key,
            value,
            &format!("must be between {min} and {max}"),
        ));
    }
    Ok(())
}

/// Weights must be non-negative and sum to 1 within `tolerance`.
fn weight_set(
    section: &str,
    key: &str,
    weights: impl IntoIterator<Item = f64>,
    tolerance: f64,
) -> Result<(), FactorlabError> {
    let mut sum = 0.0;
    for w in weights {
        if w < 0.0 {
            return Err(FactorlabError::invalid(section, key, w, "weights must be non-negative"));
        }
        sum += w;
    }
    if (sum - 1.0).abs() > tolerance {
        return Err(FactorlabError::invalid(
            section,
            key,
            format!("{sum:.4}"),
            "weights must sum to 1",
        ));
    }
    Ok(())
}

fn validate_scoring(config: &EngineConfig) -> Result<(), FactorlabError> {
    positive(
        "scoring",
        "differentiation_exponent",
        config.scoring.differentiation_exponent,
    )
}

fn validate_regime(config: &EngineConfig) -> Result<(), FactorlabError> {
    let r = &config.regime;
    positive("regime", "high_volatility_vix", r.high_volatility_vix)?;
    positive("regime", "bull_max_vix", r.bull_max_vix)?;
    positive("regime", "bear_min_vix", r.bear_min_vix)?;
    if r.bull_max_vix > r.high_volatility_vix {
        return Err(FactorlabError::invalid(
            "regime",
            "bull_max_vix",
            r.bull_max_vix,
            "must not exceed high_volatility_vix",
        ));
    }
    if r.average_period == 0 {
        return Err(FactorlabError::invalid("regime", "average_period", 0, "must be at least 1"));
    }
    Ok(())
}

fn validate_weight_band(config: &EngineConfig) -> Result<(), FactorlabError> {
    let w = &config.weights;
    in_range("weights", "tolerance", w.tolerance, 0.0, 0.1)?;
    in_range("weights", "min_weight", w.min_weight, 0.0, 1.0 / 6.0)?;
    in_range("weights", "max_weight", w.max_weight, 1.0 / 6.0, 1.0)?;
    Ok(())
}

fn validate_base_weights(config: &EngineConfig) -> Result<(), FactorlabError> {
    let w = &config.weights;
    for regime in MarketRegime::ALL {
        weight_set(
            "weights",
            regime.key(),
            w.base[regime.index()],
            w.tolerance,
        )?;
    }
    Ok(())
}

fn validate_horizon_deltas(config: &EngineConfig) -> Result<(), FactorlabError> {
    let w = &config.weights;
    for horizon in Horizon::ALL {
        let row = w.horizon_deltas[horizon.index()];
        let sum: f64 = row.iter().sum();
        if sum.abs() > w.tolerance {
            return Err(FactorlabError::invalid(
                "horizon",
                horizon.key(),
                format!("{sum:.4}"),
                "deltas must sum to 0",
            ));
        }
        for kind in FactorKind::ALL {
            in_range(
                "horizon",
                &format!("{}_{}", horizon.key(), kind.key()),
                row[kind.index()],
                -0.5,
                0.5,
            )?;
        }
    }
    Ok(())
}

fn validate_factor_weights(config: &EngineConfig) -> Result<(), FactorlabError> {
    for (kind, entries) in config.factors.sub_weights() {
        weight_set(
            "factors",
            kind.key(),
            entries.iter().map(|(_, w)| *w),
            config.weights.tolerance,
        )?;
    }
    Ok(())
}

fn validate_smart_money(config: &EngineConfig) -> Result<(), FactorlabError> {
    let s = &config.factors.smart_money;
    positive("smart_money", "insider_lookback_days", s.insider_lookback_days as f64)?;
    positive("smart_money", "insider_half_life_days", s.insider_half_life_days)?;
    positive("smart_money", "legislator_lookback_days", s.legislator_lookback_days as f64)?;
    positive("smart_money", "legislator_half_life_days", s.legislator_half_life_days)?;
    if s.min_cluster_buyers == 0 {
        return Err(FactorlabError::invalid(
            "smart_money",
            "min_cluster_buyers",
            0,
            "must be at least 1",
        ));
    }
    in_range("smart_money", "default_fund_reputation", s.default_fund_reputation, 0.0, 1.0)?;
    for (fund, weight) in &s.fund_reputation {
        in_range("fund_reputation", fund, *weight, 0.0, 1.0)?;
    }
    Ok(())
}

fn validate_catalyst(config: &EngineConfig) -> Result<(), FactorlabError> {
    let c = &config.factors.catalyst;
    non_negative("scoring", "near_term_catalyst_days", c.near_term_days as f64)?;
    for (sector, row) in c.sector_rotation.entries() {
        for score in row {
            in_range("sector_rotation", sector, *score, 0.0, 100.0)?;
        }
    }
    Ok(())
}

fn validate_risk(config: &EngineConfig) -> Result<(), FactorlabError> {
    let r = &config.risk;
    if !(1..=10).contains(&r.min_conviction) {
        return Err(FactorlabError::invalid(
            "risk",
            "min_conviction",
            r.min_conviction,
            "must be between 1 and 10",
        ));
    }
    non_negative("risk", "min_price", r.min_price)?;
    non_negative("risk", "min_market_cap", r.min_market_cap)?;
    non_negative("risk", "min_avg_dollar_volume", r.min_avg_dollar_volume)?;
    positive("risk", "max_days_to_cover", r.max_days_to_cover)?;
    positive("risk", "max_debt_to_equity", r.max_debt_to_equity)?;
    non_negative("risk", "min_current_ratio", r.min_current_ratio)?;
    Ok(())
}

fn validate_sizing(config: &EngineConfig) -> Result<(), FactorlabError> {
    let s = &config.sizing;
    if s.win_rate <= 0.0 || s.win_rate >= 1.0 {
        return Err(FactorlabError::invalid("sizing", "win_rate", s.win_rate, "must be in (0, 1)"));
    }
    positive("sizing", "avg_win", s.avg_win)?;
    positive("sizing", "avg_loss", s.avg_loss)?;
    if s.safety_fraction <= 0.0 || s.safety_fraction > 1.0 {
        return Err(FactorlabError::invalid(
            "sizing",
            "safety_fraction",
            s.safety_fraction,
            "must be in (0, 1]",
        ));
    }
    in_range("sizing", "min_position", s.min_position, 0.0, 1.0)?;
    in_range("sizing", "max_position", s.max_position, s.min_position, 1.0)?;
    Ok(())
}

fn validate_portfolio(config: &EngineConfig) -> Result<(), FactorlabError> {
    let p = &config.portfolio;
    for (key, value) in [
        ("max_per_sector_per_horizon", p.max_per_sector_per_horizon),
        ("max_per_horizon", p.max_per_horizon),
        ("max_positions", p.max_positions),
    ] {
        if value == 0 {
            return Err(FactorlabError::invalid("portfolio", key, 0, "must be at least 1"));
        }
    }
    if p.min_positions > p.max_positions {
        return Err(FactorlabError::invalid(
            "portfolio",
            "min_positions",
            p.min_positions,
            "must not exceed max_positions",
        ));
    }
    if p.max_sector_exposure <= 0.0 || p.max_sector_exposure > 1.0 {
        return Err(FactorlabError::invalid(
            "portfolio",
            "max_sector_exposure",
            p.max_sector_exposure,
            "must be in (0, 1]",
        ));
    }
    Ok(())
}
