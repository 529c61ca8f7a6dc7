//! Smart-money factor: institutional holding changes, insider buying
//! clusters and legislator trades.
//!
//! Ownership records arrive as the feeds deliver them. A record whose date or
//! amount cannot be parsed is skipped on its own; records dated after the
//! as-of date are ignored.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use super::{Curve, FactorConfig, FactorKind, FactorResult, NEUTRAL_SCORE, ScoringContext, SubComponent};
use crate::domain::security::{
    InsiderTransaction, InstitutionalHolding, LegislatorTransaction, OwnershipFlow, SecurityInput,
    TradeSide, parse_amount_range, parse_record_date,
};

/// Reputation-weighted average change in fund holdings, -1.0 to +1.0.
pub const INSTITUTIONAL_CURVE: Curve = Curve(&[
    (-0.5, 0.0),
    (-0.2, 20.0),
    (0.0, 50.0),
    (0.1, 65.0),
    (0.2, 80.0),
    (0.5, 100.0),
]);

/// Net decayed legislator dollar flow.
pub const LEGISLATOR_CURVE: Curve = Curve(&[
    (-500_000.0, 0.0),
    (-100_000.0, 20.0),
    (0.0, 50.0),
    (100_000.0, 80.0),
    (500_000.0, 100.0),
]);

#[derive(Debug, Clone, PartialEq)]
pub struct SmartMoneyWeights {
    pub institutional: f64,
    pub insider: f64,
    pub legislator: f64,
}

impl Default for SmartMoneyWeights {
    fn default() -> Self {
        SmartMoneyWeights {
            institutional: 0.40,
            insider: 0.35,
            legislator: 0.25,
        }
    }
}

impl SmartMoneyWeights {
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("institutional", self.institutional),
            ("insider", self.insider),
            ("legislator", self.legislator),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmartMoneyConfig {
    pub weights: SmartMoneyWeights,
    pub insider_lookback_days: i64,
    pub insider_half_life_days: f64,
    pub min_cluster_buyers: usize,
    pub legislator_lookback_days: i64,
    pub legislator_half_life_days: f64,
    /// Case-insensitive fund-name fragment and its reputation weight.
    pub fund_reputation: Vec<(String, f64)>,
    pub default_fund_reputation: f64,
}

impl Default for SmartMoneyConfig {
    fn default() -> Self {
        let fund_reputation = [
            ("berkshire hathaway", 1.0),
            ("baupost", 0.9),
            ("renaissance technologies", 0.95),
            ("bridgewater", 0.9),
            ("d. e. shaw", 0.85),
            ("two sigma", 0.85),
            ("citadel", 0.85),
            ("pershing square", 0.85),
            ("appaloosa", 0.85),
            ("tiger global", 0.75),
            ("elliott", 0.8),
            ("vanguard", 0.4),
            ("blackrock", 0.4),
            ("state street", 0.4),
        ]
        .into_iter()
        .map(|(name, w)| (name.to_string(), w))
        .collect();
        SmartMoneyConfig {
            weights: SmartMoneyWeights::default(),
            insider_lookback_days: 90,
            insider_half_life_days: 45.0,
            min_cluster_buyers: 3,
            legislator_lookback_days: 180,
            legislator_half_life_days: 60.0,
            fund_reputation,
            default_fund_reputation: 0.5,
        }
    }
}

impl SmartMoneyConfig {
    pub fn reputation(&self, fund: &str) -> f64 {
        let name = fund.to_lowercase();
        self.fund_reputation
            .iter()
            .filter(|(fragment, _)| name.contains(fragment.as_str()))
            .map(|(_, w)| *w)
            .fold(None, |best: Option<f64>, w| Some(best.map_or(w, |b| b.max(w))))
            .unwrap_or(self.default_fund_reputation)
    }
}

/// Outcome of one smart-money sub-signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalScore {
    pub score: f64,
    /// Records that contributed to the signal.
    pub signal_count: usize,
    /// `None` when there was no usable data.
    pub raw_value: Option<f64>,
    pub description: String,
}

impl SignalScore {
    fn unavailable(what: &str) -> Self {
        SignalScore {
            score: NEUTRAL_SCORE,
            signal_count: 0,
            raw_value: None,
            description: format!("{what} unavailable"),
        }
    }

    fn into_component(self, name: &'static str, weight: f64) -> SubComponent {
        SubComponent {
            name,
            score: self.score.clamp(0.0, 100.0),
            weight,
            raw_value: self.raw_value,
            description: self.description,
        }
    }
}

pub fn compute_smart_money(
    input: &SecurityInput,
    _ctx: &ScoringContext,
    config: &FactorConfig,
) -> FactorResult {
    let cfg = &config.smart_money;
    let w = &cfg.weights;
    let flow = &input.ownership;

    let components = vec![
        score_institutional_flow(flow, cfg).into_component("institutional_flow", w.institutional),
        score_insider_cluster(&flow.insider_transactions, input.as_of, cfg)
            .into_component("insider_cluster", w.insider),
        score_legislator_flow(&flow.legislator_transactions, input.as_of, cfg)
            .into_component("legislator_flow", w.legislator),
    ];
    FactorResult::from_components(FactorKind::SmartMoney, components)
}

fn holdings_by_fund(holdings: &[InstitutionalHolding]) -> HashMap<String, f64> {
    let mut map = HashMap::new();
    for h in holdings.iter().filter(|h| h.shares.is_finite()) {
        *map.entry(h.fund.trim().to_lowercase()).or_insert(0.0) += h.shares.max(0.0);
    }
    map
}

/// Reputation-weighted mean of per-fund share changes between the previous
/// and current holdings reports. Needs both reports.
pub fn score_institutional_flow(flow: &OwnershipFlow, config: &SmartMoneyConfig) -> SignalScore {
    if flow.current_holdings.is_empty() || flow.previous_holdings.is_empty() {
        return SignalScore::unavailable("institutional holdings change");
    }
    let current = holdings_by_fund(&flow.current_holdings);
    let previous = holdings_by_fund(&flow.previous_holdings);
    let funds: HashSet<&String> = current.keys().chain(previous.keys()).collect();

    let mut weighted = 0.0;
    let mut total_reputation = 0.0;
    let mut count = 0;
    let mut increased = 0;
    for fund in funds {
        let prev = previous.get(fund).copied().unwrap_or(0.0);
        let cur = current.get(fund).copied().unwrap_or(0.0);
        let change = if prev > 0.0 {
            ((cur - prev) / prev).clamp(-1.0, 1.0)
        } else if cur > 0.0 {
            1.0
        } else {
            continue;
        };
        let rep = config.reputation(fund);
        weighted += rep * change;
        total_reputation += rep;
        count += 1;
        if change > 0.0 {
            increased += 1;
        }
    }
    if count == 0 || total_reputation <= 0.0 {
        return SignalScore::unavailable("institutional holdings change");
    }
    let net = weighted / total_reputation;
    SignalScore {
        score: INSTITUTIONAL_CURVE.eval(net),
        signal_count: count,
        raw_value: Some(net),
        description: format!(
            "{increased} of {count} funds added; weighted change {:+.1}%",
            net * 100.0
        ),
    }
}

/// Title weight: senior officers' trades carry more information.
pub fn title_weight(title: &str) -> f64 {
    let t = title.to_lowercase();
    if t.contains("ceo") || t.contains("chief executive") {
        1.0
    } else if t.contains("cfo") || t.contains("chief financial") {
        0.9
    } else if t.contains("president") || t.contains("coo") || t.contains("chief operating") {
        0.85
    } else if t.contains("director") {
        0.7
    } else if t.contains("10%") || t.contains("owner") {
        0.6
    } else {
        0.5
    }
}

fn recency_decay(days: i64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(days as f64 / half_life_days)
}

/// Insider-cluster detection. Clustered buying (at least
/// `min_cluster_buyers` distinct buyers inside the lookback) scores 75 plus
/// up to 25; isolated buying 50 plus up to 20. Weighted selling subtracts.
pub fn score_insider_cluster(
    transactions: &[InsiderTransaction],
    as_of: NaiveDate,
    config: &SmartMoneyConfig,
) -> SignalScore {
    if transactions.is_empty() {
        return SignalScore::unavailable("insider activity");
    }

    let mut buyers: HashSet<String> = HashSet::new();
    let mut buy_strength = 0.0;
    let mut sell_strength = 0.0;
    let mut count = 0;
    let mut usable = 0;

    for tx in transactions {
        let Some(date) = parse_record_date(&tx.date) else {
            debug!(name = %tx.name, date = %tx.date, "skipping insider record with unparsable date");
            continue;
        };
        if !tx.shares.is_finite() || tx.shares <= 0.0 {
            debug!(name = %tx.name, shares = tx.shares, "skipping insider record with invalid share count");
            continue;
        }
        usable += 1;
        let days = (as_of - date).num_days();
        if days < 0 || days > config.insider_lookback_days {
            continue;
        }
        let weight = title_weight(&tx.title) * recency_decay(days, config.insider_half_life_days);
        count += 1;
        match tx.side {
            TradeSide::Buy => {
                buy_strength += weight;
                buyers.insert(tx.name.trim().to_lowercase());
            }
            TradeSide::Sell => sell_strength += weight,
        }
    }

    if usable == 0 {
        return SignalScore::unavailable("insider activity");
    }
    if count == 0 {
        return SignalScore {
            score: NEUTRAL_SCORE,
            signal_count: 0,
            raw_value: Some(0.0),
            description: format!(
                "no insider trades in the last {} days",
                config.insider_lookback_days
            ),
        };
    }

    let clustered = buyers.len() >= config.min_cluster_buyers;
    let score = if clustered {
        75.0 + (buy_strength * 8.0).min(25.0) - (sell_strength * 3.0).min(15.0)
    } else {
        50.0 + (buy_strength * 10.0).min(20.0) - (sell_strength * 6.0).min(35.0)
    };
    let description = if clustered {
        format!(
            "cluster of {} insider buyers in {} days",
            buyers.len(),
            config.insider_lookback_days
        )
    } else {
        format!(
            "{} insider buyers, weighted buys {buy_strength:.2} vs sells {sell_strength:.2}",
            buyers.len()
        )
    };

    SignalScore {
        score: score.clamp(0.0, 100.0),
        signal_count: count,
        raw_value: Some(buy_strength - sell_strength),
        description,
    }
}

/// Net legislator dollar flow (amount-range midpoints) with recency decay.
pub fn score_legislator_flow(
    transactions: &[LegislatorTransaction],
    as_of: NaiveDate,
    config: &SmartMoneyConfig,
) -> SignalScore {
    if transactions.is_empty() {
        return SignalScore::unavailable("legislator trades");
    }

    let mut net = 0.0;
    let mut count = 0;
    let mut usable = 0;
    let mut traders: HashSet<String> = HashSet::new();

    for tx in transactions {
        let (Some(date), Some(amount)) = (
            parse_record_date(&tx.date),
            parse_amount_range(&tx.amount_range),
        ) else {
            debug!(name = %tx.name, date = %tx.date, amount = %tx.amount_range, "skipping malformed legislator record");
            continue;
        };
        usable += 1;
        let days = (as_of - date).num_days();
        if days < 0 || days > config.legislator_lookback_days {
            continue;
        }
        net += tx.side.sign() * amount * recency_decay(days, config.legislator_half_life_days);
        count += 1;
        traders.insert(tx.name.trim().to_lowercase());
    }

    if usable == 0 {
        return SignalScore::unavailable("legislator trades");
    }
    if count == 0 {
        return SignalScore {
            score: NEUTRAL_SCORE,
            signal_count: 0,
            raw_value: Some(0.0),
            description: format!(
                "no legislator trades in the last {} days",
                config.legislator_lookback_days
            ),
        };
    }

    SignalScore {
        score: LEGISLATOR_CURVE.eval(net),
        signal_count: count,
        raw_value: Some(net),
        description: format!(
            "{count} trades by {} legislators, net ${net:.0}",
            traders.len()
        ),
    }
}
