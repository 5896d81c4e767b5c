//! Deterministic option position close loop.
//!
//! Runs as a long-lived service that:
//! - Classifies each instant against the exchange calendar
//! - Sleeps on a tiered schedule while the market is shut
//! - Applies the profit rule to open option positions while it is open
//! - Closes winners with preview-then-execute sell-to-close orders
//!
//! All rules are deterministic; every close is justified by numbers that
//! are logged before the order goes out.

pub mod evaluator;
pub mod service;
pub mod types;

pub use types::{CloseDecision, ManagerConfig};
