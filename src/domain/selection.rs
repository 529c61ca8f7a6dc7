//! Portfolio selection from ranked, filtered scores.
//!
//! Walks the ranked list once, admitting each passing security unless it
//! would breach a per-sector, per-horizon, sector-exposure or total cap. A
//! shortfall against `min_positions` is reported, never padded with filtered
//! names.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use super::aggregator::{EnhancedScore, rank_order};
use super::factor::catalyst::normalize_sector;
use super::weights::Horizon;

pub const UNCLASSIFIED_SECTOR: &str = "unclassified";

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioConstraints {
    pub max_per_sector_per_horizon: usize,
    pub max_per_horizon: usize,
    /// Sum of position sizes allowed in one sector.
    pub max_sector_exposure: f64,
    pub min_positions: usize,
    pub max_positions: usize,
}

impl Default for PortfolioConstraints {
    fn default() -> Self {
        PortfolioConstraints {
            max_per_sector_per_horizon: 2,
            max_per_horizon: 10,
            max_sector_exposure: 0.25,
            min_positions: 5,
            max_positions: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FailedRiskFilter,
    ZeroSize,
    SectorLimit,
    HorizonLimit,
    SectorExposure,
    PortfolioFull,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::FailedRiskFilter => "failed risk filter",
            SkipReason::ZeroSize => "zero position size",
            SkipReason::SectorLimit => "sector pick limit for horizon",
            SkipReason::HorizonLimit => "horizon pick limit",
            SkipReason::SectorExposure => "sector exposure limit",
            SkipReason::PortfolioFull => "portfolio full",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSelection {
    /// In rank order.
    pub picks: Vec<EnhancedScore>,
    pub skipped: Vec<(String, SkipReason)>,
    /// Picks missing to reach `min_positions`.
    pub shortfall: usize,
}

impl PortfolioSelection {
    pub fn picks_for(&self, horizon: Horizon) -> impl Iterator<Item = &EnhancedScore> {
        self.picks.iter().filter(move |p| p.horizon == horizon)
    }

    pub fn total_exposure(&self) -> f64 {
        self.picks.iter().map(|p| p.position_size).sum()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.picks.iter().any(|p| p.ticker == ticker)
    }
}

/// Normalized sector name, so feed aliases share one cap.
pub fn sector_key(sector: Option<&str>) -> String {
    sector
        .map(normalize_sector)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_string())
}

pub fn select_portfolio(scores: &[EnhancedScore], constraints: &PortfolioConstraints) -> PortfolioSelection {
    let mut ranked: Vec<&EnhancedScore> = scores.iter().collect();
    ranked.sort_by(|a, b| rank_order(a, b));

    let mut picks: Vec<EnhancedScore> = Vec::new();
    let mut skipped = Vec::new();
    let mut per_sector_horizon: HashMap<(String, Horizon), usize> = HashMap::new();
    let mut per_horizon: HashMap<Horizon, usize> = HashMap::new();
    let mut exposure: HashMap<String, f64> = HashMap::new();

    for score in ranked {
        let sector = sector_key(score.sector.as_deref());
        let reason = if !score.passes_filters() {
            Some(SkipReason::FailedRiskFilter)
        } else if score.position_size <= 0.0 {
            Some(SkipReason::ZeroSize)
        } else if picks.len() >= constraints.max_positions {
            Some(SkipReason::PortfolioFull)
        } else if per_horizon.get(&score.horizon).copied().unwrap_or(0) >= constraints.max_per_horizon {
            Some(SkipReason::HorizonLimit)
        } else if per_sector_horizon
            .get(&(sector.clone(), score.horizon))
            .copied()
            .unwrap_or(0)
            >= constraints.max_per_sector_per_horizon
        {
            Some(SkipReason::SectorLimit)
        } else if exposure.get(&sector).copied().unwrap_or(0.0) + score.position_size
            > constraints.max_sector_exposure + 1e-12
        {
            Some(SkipReason::SectorExposure)
        } else {
            None
        };

        match reason {
            Some(reason) => skipped.push((score.ticker.clone(), reason)),
            None => {
                *per_horizon.entry(score.horizon).or_insert(0) += 1;
                *exposure.entry(sector.clone()).or_insert(0.0) += score.position_size;
                *per_sector_horizon.entry((sector, score.horizon)).or_insert(0) += 1;
                picks.push(score.clone());
            }
        }
    }

    let shortfall = constraints.min_positions.saturating_sub(picks.len());
    if shortfall > 0 {
        warn!(
            picks = picks.len(),
            minimum = constraints.min_positions,
            "not enough securities passed selection"
        );
    }

    PortfolioSelection {
        picks,
        skipped,
        shortfall,
    }
}
