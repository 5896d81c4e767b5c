//! Profit rule — decides which long option positions to close.
//!
//! Pure functions over broker snapshots. Quotes are joined to positions by
//! symbol, never by response position, so a reordered or partial quote
//! response can only shrink the candidate set, not misprice it.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use autoclose_tradier::{Position, Quote};

use crate::types::{CloseDecision, ManagerConfig};

/// Indexes quotes by symbol. The first quote for a symbol wins; a duplicate
/// is logged and dropped.
pub fn join_by_symbol(quotes: &[Quote]) -> HashMap<&str, &Quote> {
    let mut by_symbol: HashMap<&str, &Quote> = HashMap::with_capacity(quotes.len());
    for quote in quotes {
        match by_symbol.entry(quote.symbol.as_str()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(quote);
            }
            std::collections::hash_map::Entry::Occupied(_) => {
                tracing::warn!(
                    symbol = quote.symbol,
                    "Duplicate quote in response, keeping first"
                );
            }
        }
    }
    by_symbol
}

/// Requested symbols that have no quote in the joined map.
pub fn missing_quotes<'a>(
    requested: &'a [String],
    joined: &HashMap<&str, &Quote>,
) -> Vec<&'a str> {
    requested
        .iter()
        .map(String::as_str)
        .filter(|s| !joined.contains_key(s))
        .collect()
}

/// Gain fraction of `last` over `unit_cost`. `None` when the cost is not a
/// positive number, since the fraction is undefined there.
pub fn profit_fraction(unit_cost: Decimal, last: Decimal) -> Option<Decimal> {
    if unit_cost <= Decimal::ZERO {
        return None;
    }
    Some((last - unit_cost) / unit_cost)
}

/// Applies the profit rule to one position/quote pair.
///
/// Returns a decision only for a long option position with a whole-contract
/// quantity, a positive per-contract cost, a last trade price, and a gain
/// fraction at or above the threshold. Everything else is skipped with a
/// log line naming the reason.
pub fn should_close(
    position: &Position,
    quote: &Quote,
    threshold: Decimal,
) -> Option<CloseDecision> {
    if !quote.is_option() {
        tracing::debug!(symbol = position.symbol, "Skipping non-option position");
        return None;
    }

    let quantity = match position.quantity.to_u32() {
        Some(q) if q > 0 && Decimal::from(q) == position.quantity => q,
        _ => {
            tracing::debug!(
                symbol = position.symbol,
                quantity = %position.quantity,
                "Skipping position without a positive whole-contract quantity"
            );
            return None;
        }
    };

    let Some(unit_cost) = position.option_unit_cost() else {
        tracing::warn!(
            symbol = position.symbol,
            cost_basis = %position.cost_basis,
            "Skipping position with unusable cost basis"
        );
        return None;
    };

    let Some(last) = quote.last else {
        tracing::debug!(symbol = position.symbol, "No last trade price, skipping");
        return None;
    };

    let fraction = profit_fraction(unit_cost, last)?;
    if fraction < threshold {
        tracing::debug!(
            symbol = position.symbol,
            profit_fraction = %fraction,
            "Below profit threshold"
        );
        return None;
    }

    let Some(underlying) = quote.underlying.clone() else {
        tracing::warn!(
            symbol = position.symbol,
            "Option quote is missing its underlying, cannot build order"
        );
        return None;
    };

    Some(CloseDecision {
        underlying_symbol: underlying,
        option_symbol: position.symbol.clone(),
        quantity,
        unit_cost,
        last,
        profit_fraction: fraction,
    })
}

/// Evaluates every position against the quote snapshot and returns the
/// positions to close.
pub fn evaluate_positions(
    positions: &[Position],
    quotes: &[Quote],
    config: &ManagerConfig,
) -> Vec<CloseDecision> {
    let joined = join_by_symbol(quotes);

    let mut decisions = Vec::new();
    for position in positions {
        let Some(quote) = joined.get(position.symbol.as_str()) else {
            tracing::warn!(symbol = position.symbol, "No quote returned for position");
            continue;
        };
        if let Some(decision) = should_close(position, quote, config.profit_threshold) {
            tracing::info!(
                symbol = decision.option_symbol,
                quantity = decision.quantity,
                unit_cost = %decision.unit_cost,
                last = %decision.last,
                profit_fraction = %decision.profit_fraction,
                "Profit threshold reached"
            );
            decisions.push(decision);
        }
    }
    decisions
}
