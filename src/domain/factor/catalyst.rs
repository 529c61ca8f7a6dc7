//! Catalyst factor: earnings-date proximity and sector rotation.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::{Curve, FactorConfig, FactorKind, FactorResult, ScoringContext, SubComponent};
use crate::domain::regime::MarketRegime;
use crate::domain::security::SecurityInput;

/// Days until the next earnings report. Peaks inside a week, decays past
/// eight weeks.
pub const EARNINGS_PROXIMITY_CURVE: Curve = Curve(&[
    (0.0, 100.0),
    (7.0, 95.0),
    (14.0, 85.0),
    (28.0, 70.0),
    (56.0, 55.0),
    (90.0, 45.0),
    (180.0, 40.0),
]);

pub const PAST_EARNINGS_SCORE: f64 = 40.0;
/// Largest adjustment relative sector momentum can make to the table score.
pub const MAX_SECTOR_NUDGE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalystWeights {
    pub earnings_proximity: f64,
    pub sector_rotation: f64,
}

impl Default for CatalystWeights {
    fn default() -> Self {
        CatalystWeights {
            earnings_proximity: 0.50,
            sector_rotation: 0.50,
        }
    }
}

impl CatalystWeights {
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("earnings_proximity", self.earnings_proximity),
            ("sector_rotation", self.sector_rotation),
        ]
    }
}

/// Static sector x regime attractiveness, scores indexed by
/// [`MarketRegime::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct SectorRotationTable {
    scores: HashMap<String, [f64; 4]>,
}

impl Default for SectorRotationTable {
    fn default() -> Self {
        let mut table = SectorRotationTable {
            scores: HashMap::new(),
        };
        //                                   bull  bear  side  hvol
        table.set("technology", [85.0, 30.0, 55.0, 35.0]);
        table.set("consumer discretionary", [80.0, 30.0, 50.0, 30.0]);
        table.set("communication services", [75.0, 40.0, 55.0, 40.0]);
        table.set("financials", [75.0, 35.0, 55.0, 35.0]);
        table.set("industrials", [70.0, 40.0, 55.0, 40.0]);
        table.set("materials", [65.0, 40.0, 50.0, 40.0]);
        table.set("energy", [60.0, 45.0, 50.0, 45.0]);
        table.set("real estate", [55.0, 45.0, 55.0, 40.0]);
        table.set("health care", [50.0, 75.0, 60.0, 70.0]);
        table.set("consumer staples", [40.0, 85.0, 60.0, 80.0]);
        table.set("utilities", [35.0, 80.0, 60.0, 80.0]);
        table
    }
}

impl SectorRotationTable {
    pub fn set(&mut self, sector: &str, scores: [f64; 4]) {
        self.scores.insert(normalize_sector(sector), scores);
    }

    pub fn get(&self, sector: &str, regime: MarketRegime) -> Option<f64> {
        self.scores
            .get(&normalize_sector(sector))
            .map(|row| row[regime.index()])
    }

    /// Sorted for stable iteration.
    pub fn entries(&self) -> Vec<(&str, &[f64; 4])> {
        let mut rows: Vec<_> = self.scores.iter().map(|(k, v)| (k.as_str(), v)).collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }
}

/// Lower-case, whitespace-collapsed sector name with the common aliases
/// folded onto the GICS names used in the table.
pub fn normalize_sector(sector: &str) -> String {
    let name = sector
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    match name.as_str() {
        "information technology" | "tech" => "technology".to_string(),
        "healthcare" => "health care".to_string(),
        "financial services" | "financial" => "financials".to_string(),
        "telecommunication services" | "communications" => "communication services".to_string(),
        "consumer cyclical" => "consumer discretionary".to_string(),
        "consumer defensive" => "consumer staples".to_string(),
        "basic materials" => "materials".to_string(),
        _ => name,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalystConfig {
    pub weights: CatalystWeights,
    /// Earnings this many days out or fewer count as a near-term catalyst.
    pub near_term_days: i64,
    pub sector_rotation: SectorRotationTable,
}

impl Default for CatalystConfig {
    fn default() -> Self {
        CatalystConfig {
            weights: CatalystWeights::default(),
            near_term_days: 14,
            sector_rotation: SectorRotationTable::default(),
        }
    }
}

pub fn days_until(next: NaiveDate, as_of: NaiveDate) -> i64 {
    (next - as_of).num_days()
}

pub fn has_near_term_catalyst(input: &SecurityInput, config: &CatalystConfig) -> bool {
    input
        .next_earnings
        .map(|d| (0..=config.near_term_days).contains(&days_until(d, input.as_of)))
        .unwrap_or(false)
}

pub fn compute_catalyst(
    input: &SecurityInput,
    ctx: &ScoringContext,
    config: &FactorConfig,
) -> FactorResult {
    let cfg = &config.catalyst;
    let w = &cfg.weights;

    let earnings = match input.next_earnings {
        Some(date) => {
            let days = days_until(date, input.as_of);
            if days < 0 {
                SubComponent::scored(
                    "earnings_proximity",
                    w.earnings_proximity,
                    days as f64,
                    PAST_EARNINGS_SCORE,
                    format!("last known earnings date {date} already passed"),
                )
            } else {
                SubComponent::scored(
                    "earnings_proximity",
                    w.earnings_proximity,
                    days as f64,
                    EARNINGS_PROXIMITY_CURVE.eval(days as f64),
                    format!("earnings in {days} days"),
                )
            }
        }
        None => SubComponent::unavailable("earnings_proximity", w.earnings_proximity, "earnings date"),
    };

    let regime = ctx.regime.regime;
    let rotation = match input
        .sector
        .as_deref()
        .and_then(|s| cfg.sector_rotation.get(s, regime).map(|score| (s, score)))
    {
        Some((sector, base)) => {
            let relative = ctx.sector_momentum.get(&normalize_sector(sector)).copied();
            let nudge = relative
                .map(|r| (r * 100.0).clamp(-MAX_SECTOR_NUDGE, MAX_SECTOR_NUDGE))
                .unwrap_or(0.0);
            let description = match relative {
                Some(r) => format!(
                    "{sector} in {regime} regime, relative momentum {:+.1}%",
                    r * 100.0
                ),
                None => format!("{sector} in {regime} regime"),
            };
            SubComponent::scored(
                "sector_rotation",
                w.sector_rotation,
                base,
                base + nudge,
                description,
            )
        }
        None => SubComponent::unavailable("sector_rotation", w.sector_rotation, "sector rotation"),
    };

    FactorResult::from_components(FactorKind::Catalyst, vec![earnings, rotation])
}
