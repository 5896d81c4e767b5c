//! Tradier brokerage integration for the option position close loop.
//!
//! This crate provides:
//! - REST client with rate limiting for the Tradier brokerage API
//! - Bearer-token authentication against brokerage or sandbox
//! - Decoding of the broker's calendar, position, quote, and order payloads
//! - Two-phase (preview then execute) option order submission
//!
//! # Example
//!
//! ```ignore
//! use autoclose_tradier::{TradierClient, TradierClientConfig};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TradierClientConfig::sandbox().with_account_id("VA000000");
//!     let client = TradierClient::new(config)?;
//!
//!     // Build the rolling calendar window around today.
//!     let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//!     let calendar = client.get_market_calendar_window(today, 3, 3).await?;
//!     println!("calendar covers {} days", calendar.len());
//!
//!     // Close a profitable option position.
//!     let confirmation = client
//!         .sell_to_close("SPY", "SPY240315C00500000", 5)
//!         .await?;
//!     println!("order {:?}: {:?}", confirmation.id, confirmation.status);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Authentication
//!
//! Tradier uses bearer tokens. The client reads the token from an
//! environment variable at construction:
//!
//! - `TRADIER_API_KEY` for the brokerage environment
//! - `TRADIER_SANDBOX_API_KEY` for the sandbox
//!
//! The variable name is part of [`TradierClientConfig`], so tests and
//! alternate deployments can point at any variable without global state.
//!
//! # API Endpoints
//!
//! The client supports the following Tradier endpoints:
//!
//! - `GET /markets/calendar` - Month of trading-day records
//! - `GET /markets/clock` - Current market clock
//! - `GET /markets/quotes` - Quotes for a symbol list
//! - `GET /accounts/{id}/positions` - Open positions
//! - `GET /accounts/{id}/balances` - Account balances
//! - `GET /accounts/{id}/orders` - Order list
//! - `POST /accounts/{id}/orders` - Option order submission (and preview)

pub mod client;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::{
    TradierClient, TradierClientConfig, TRADIER_BROKERAGE_URL, TRADIER_SANDBOX_URL,
};
pub use error::{Result, TradierError};
pub use types::{
    AccountBalances, CalendarDayRecord, MarketClock, OptionOrderRequest, Order, OrderConfirmation,
    OrderDuration, OrderSide, OrderType, Position, Quote, SecurityType,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_exports() {
        let config = TradierClientConfig::default();
        assert_eq!(config.base_url, TRADIER_BROKERAGE_URL);
        assert!(TRADIER_SANDBOX_URL.starts_with("https://"));
    }

    #[test]
    fn test_error_types_accessible() {
        let err = TradierError::api(400, "bad request");
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_types_accessible() {
        let order = OptionOrderRequest::sell_to_close("SPY", "SPY240315C00500000", 5);
        assert_eq!(order.underlying_symbol, "SPY");
        assert_eq!(order.side, OrderSide::SellToClose);
    }
}
