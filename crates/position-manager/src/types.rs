//! Types for the option position close loop.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Close a position once its gain fraction reaches this value
    /// (0.20 = +20% over per-contract cost).
    pub profit_threshold: Decimal,

    /// Wall-clock budget for one service run, in seconds.
    pub time_limit_secs: u64,

    /// Iteration budget for one service run.
    pub loop_limit: u64,

    /// Months of calendar history to fetch behind today.
    pub months_back: u32,

    /// Months of calendar to fetch ahead of today.
    pub months_forward: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            profit_threshold: Decimal::new(20, 2),
            time_limit_secs: 24 * 60 * 60,
            loop_limit: 20_000,
            months_back: 3,
            months_forward: 3,
        }
    }
}

/// A position the evaluator has decided to close, with the numbers that
/// justified it.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseDecision {
    /// Underlying symbol for the order ticket.
    pub underlying_symbol: String,
    /// OCC option symbol to close.
    pub option_symbol: String,
    /// Whole contracts to sell.
    pub quantity: u32,
    /// Per-contract cost in per-share terms.
    pub unit_cost: Decimal,
    /// Last trade price that triggered the close.
    pub last: Decimal,
    /// Gain fraction at decision time.
    pub profit_fraction: Decimal,
}
