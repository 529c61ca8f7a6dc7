//! Core domain types and logic.

pub mod error;
pub mod ohlcv;
pub mod stats;
pub mod security;
pub mod regime;
pub mod factor;
pub mod weights;
pub mod risk;
pub mod sizing;
pub mod aggregator;
pub mod selection;
pub mod parallel;
pub mod config;
pub mod config_validation;
pub mod universe;
pub mod history;
pub mod position;
pub mod execution;
pub mod portfolio;
pub mod backtest;
pub mod metrics;
pub mod attribution;
