//! Tradier REST API client with rate limiting.
//!
//! Provides typed access to the Tradier brokerage endpoints with bearer
//! authentication and automatic rate limiting using the governor crate.
//! Environment (brokerage vs. sandbox) is an explicit configuration value
//! injected at construction — there is no process-wide mode switch.
//!
//! # Example
//!
//! ```ignore
//! use autoclose_tradier::{TradierClient, TradierClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TradierClientConfig::sandbox().with_account_id("VA000000");
//!     let client = TradierClient::new(config)?;
//!
//!     let clock = client.get_market_clock().await?;
//!     println!("market is {}", clock.state);
//!
//!     let positions = client.get_account_positions().await?;
//!     println!("{} open positions", positions.len());
//!
//!     Ok(())
//! }
//! ```

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use autoclose_calendar::MarketCalendar;

use crate::error::{Result, TradierError};
use crate::types::{
    AccountBalances, CalendarDayRecord, MarketClock, OptionOrderRequest, Order, OrderConfirmation,
    Position, Quote,
};

// =============================================================================
// Constants
// =============================================================================

/// Tradier production (brokerage) API base URL.
pub const TRADIER_BROKERAGE_URL: &str = "https://api.tradier.com/v1";

/// Tradier sandbox API base URL.
pub const TRADIER_SANDBOX_URL: &str = "https://sandbox.tradier.com/v1";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Tradier client.
#[derive(Debug, Clone)]
pub struct TradierClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Brokerage account id used in account-scoped paths.
    pub account_id: String,

    /// Environment variable holding the bearer token.
    pub token_env: String,

    /// Requests per minute limit.
    pub requests_per_minute: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TradierClientConfig {
    fn default() -> Self {
        Self {
            base_url: TRADIER_BROKERAGE_URL.to_string(),
            account_id: String::new(),
            token_env: "TRADIER_API_KEY".to_string(),
            requests_per_minute: nonzero!(60u32),
            timeout_secs: 30,
        }
    }
}

impl TradierClientConfig {
    /// Creates a configuration for the live brokerage environment.
    #[must_use]
    pub fn brokerage() -> Self {
        Self::default()
    }

    /// Creates a configuration for the sandbox environment.
    #[must_use]
    pub fn sandbox() -> Self {
        Self {
            base_url: TRADIER_SANDBOX_URL.to_string(),
            token_env: "TRADIER_SANDBOX_API_KEY".to_string(),
            ..Default::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the account id.
    #[must_use]
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Sets the token environment variable name.
    #[must_use]
    pub fn with_token_env(mut self, token_env: impl Into<String>) -> Self {
        self.token_env = token_env.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// Response envelopes
// =============================================================================

/// Tradier collapses single-element lists to a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Inner wrapper that is either the keyed list or the literal string
/// `"null"` the API sends for an empty set.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrNull<W> {
    Wrapped(W),
    Empty(String),
}

#[derive(Debug, Deserialize)]
struct PositionsWrapper {
    position: OneOrMany<Position>,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    positions: Option<ListOrNull<PositionsWrapper>>,
}

#[derive(Debug, Deserialize)]
struct QuotesWrapper {
    quote: OneOrMany<Quote>,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Option<ListOrNull<QuotesWrapper>>,
}

#[derive(Debug, Deserialize)]
struct OrdersWrapper {
    order: OneOrMany<Order>,
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Option<ListOrNull<OrdersWrapper>>,
}

#[derive(Debug, Deserialize)]
struct CalendarDays {
    day: OneOrMany<CalendarDayRecord>,
}

#[derive(Debug, Deserialize)]
struct CalendarBody {
    days: CalendarDays,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    calendar: CalendarBody,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    clock: MarketClock,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    balances: AccountBalances,
}

#[derive(Debug, Deserialize)]
struct OrderPostResponse {
    order: OrderConfirmation,
}

fn unwrap_list<W, T>(body: Option<ListOrNull<W>>, items: impl Fn(W) -> OneOrMany<T>) -> Vec<T> {
    match body {
        Some(ListOrNull::Wrapped(wrapper)) => items(wrapper).into(),
        // "null" or an absent key both mean an empty set.
        Some(ListOrNull::Empty(_)) | None => Vec::new(),
    }
}

// =============================================================================
// TradierClient
// =============================================================================

/// Tradier REST API client.
///
/// All requests are rate-limited and carry bearer authentication. The token
/// is read once at construction and never logged.
pub struct TradierClient {
    /// Configuration.
    config: TradierClientConfig,

    /// HTTP client.
    http: Client,

    /// Rate limiter.
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,

    /// Bearer token.
    token: SecretString,
}

impl std::fmt::Debug for TradierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradierClient")
            .field("base_url", &self.config.base_url)
            .field("account_id", &self.config.account_id)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TradierClient {
    /// Creates a client, reading the bearer token from the environment
    /// variable named in the configuration.
    ///
    /// # Errors
    /// Returns `Configuration` if the token variable or account id is
    /// missing, or if the HTTP client cannot be built.
    pub fn new(config: TradierClientConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            TradierError::Configuration(format!(
                "missing bearer token environment variable {}",
                config.token_env
            ))
        })?;
        Self::with_token(config, SecretString::from(token))
    }

    /// Creates a client with an explicitly supplied bearer token.
    ///
    /// # Errors
    /// Returns `Configuration` if the account id is empty or the HTTP
    /// client cannot be built.
    pub fn with_token(config: TradierClientConfig, token: SecretString) -> Result<Self> {
        if config.account_id.is_empty() {
            return Err(TradierError::Configuration(
                "account id must be set".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TradierError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
            token,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Returns the account id.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.config.account_id
    }

    /// Waits for the rate limiter and makes an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await?;

        self.handle_response(path, response).await
    }

    /// Waits for the rate limiter and makes an authenticated form POST.
    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .form(form)
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await?;

        self.handle_response(path, response).await
    }

    /// Handles an API response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(TradierError::rate_limit(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TradierError::api(status.as_u16(), text));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TradierError::decode(format!("{path}: {e}")))
    }

    fn account_path(&self, suffix: &str) -> String {
        format!("/accounts/{}/{}", self.config.account_id, suffix)
    }

    // =========================================================================
    // Market data endpoints
    // =========================================================================

    /// Gets the day records for one calendar month.
    ///
    /// # Errors
    /// Returns an error if the API call fails or the envelope is malformed.
    pub async fn get_market_calendar(
        &self,
        month: u32,
        year: i32,
    ) -> Result<Vec<CalendarDayRecord>> {
        let query = [
            ("month", month.to_string()),
            ("year", year.to_string()),
        ];
        let response: CalendarResponse = self.get("/markets/calendar", &query).await?;
        Ok(response.calendar.days.day.into())
    }

    /// Gets the day records for the rolling window
    /// `[base_date − mo_hist months, base_date + mo_fut months]`.
    ///
    /// # Errors
    /// Returns an error if any month fetch fails.
    pub async fn get_market_calendar_range(
        &self,
        base_date: NaiveDate,
        mo_hist: u32,
        mo_fut: u32,
    ) -> Result<Vec<CalendarDayRecord>> {
        let mut records = Vec::new();
        for offset in -(mo_hist as i64)..=(mo_fut as i64) {
            let month_date = shift_months(base_date, offset).ok_or_else(|| {
                TradierError::Configuration(format!(
                    "calendar month offset {offset} from {base_date} out of range"
                ))
            })?;
            let month = self
                .get_market_calendar(month_date.month(), month_date.year())
                .await?;
            records.extend(month);
        }
        Ok(records)
    }

    /// Fetches the rolling window and decodes it into a queryable calendar.
    ///
    /// # Errors
    /// Returns an error if a fetch fails or any day record is malformed.
    pub async fn get_market_calendar_window(
        &self,
        base_date: NaiveDate,
        mo_hist: u32,
        mo_fut: u32,
    ) -> Result<MarketCalendar> {
        let records = self
            .get_market_calendar_range(base_date, mo_hist, mo_fut)
            .await?;
        let days = records
            .into_iter()
            .map(CalendarDayRecord::into_day)
            .collect::<Result<Vec<_>>>()?;
        Ok(MarketCalendar::new(days))
    }

    /// Gets the current market clock.
    ///
    /// # Errors
    /// Returns an error if the API call fails.
    pub async fn get_market_clock(&self) -> Result<MarketClock> {
        let response: ClockResponse = self
            .get("/markets/clock", &[("delayed", "false".to_string())])
            .await?;
        Ok(response.clock)
    }

    /// Gets quotes for the given symbols, in request order.
    ///
    /// # Errors
    /// Returns an error if the API call fails.
    pub async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        let query = [
            ("symbols", symbols.join(",")),
            ("greeks", "false".to_string()),
        ];
        let response: QuotesResponse = self.get("/markets/quotes", &query).await?;
        Ok(unwrap_list(response.quotes, |w| w.quote))
    }

    // =========================================================================
    // Account endpoints
    // =========================================================================

    /// Gets current account positions. An empty account yields an empty vec.
    ///
    /// # Errors
    /// Returns an error if the API call fails.
    pub async fn get_account_positions(&self) -> Result<Vec<Position>> {
        let path = self.account_path("positions");
        let response: PositionsResponse = self.get(&path, &[]).await?;
        Ok(unwrap_list(response.positions, |w| w.position))
    }

    /// Gets account balances.
    ///
    /// # Errors
    /// Returns an error if the API call fails.
    pub async fn get_account_balances(&self) -> Result<AccountBalances> {
        let path = self.account_path("balances");
        let response: BalancesResponse = self.get(&path, &[]).await?;
        Ok(response.balances)
    }

    /// Gets account orders.
    ///
    /// # Errors
    /// Returns an error if the API call fails.
    pub async fn get_account_orders(&self) -> Result<Vec<Order>> {
        let path = self.account_path("orders");
        let response: OrdersResponse = self
            .get(&path, &[("includeTags", "true".to_string())])
            .await?;
        Ok(unwrap_list(response.orders, |w| w.order))
    }

    // =========================================================================
    // Order endpoints
    // =========================================================================

    /// Submits an option order. With `preview=true` the broker validates
    /// without executing.
    ///
    /// # Errors
    /// Returns an error if the API call fails or the order is rejected.
    pub async fn post_option_order(
        &self,
        request: &OptionOrderRequest,
        preview: bool,
    ) -> Result<OrderConfirmation> {
        let path = self.account_path("orders");
        let form = request.to_form(preview);
        let response: OrderPostResponse = self.post_form(&path, &form).await?;
        Ok(response.order)
    }

    /// Closes a long option position with the broker's required two-phase
    /// protocol: preview first, then execute only if the preview succeeds.
    ///
    /// # Errors
    /// Returns `OrderRejected` if the preview is declined; any transport or
    /// decode error from either phase is propagated.
    pub async fn sell_to_close(
        &self,
        underlying_symbol: &str,
        option_symbol: &str,
        quantity: u32,
    ) -> Result<OrderConfirmation> {
        let request = OptionOrderRequest::sell_to_close(underlying_symbol, option_symbol, quantity);

        let preview = self.post_option_order(&request, true).await?;
        if !preview.accepted() {
            return Err(TradierError::OrderRejected(format!(
                "preview declined for {option_symbol}: status {:?}",
                preview.status
            )));
        }
        tracing::info!(
            option_symbol,
            quantity,
            cost = ?preview.cost,
            commission = ?preview.commission,
            "Order preview accepted"
        );

        let confirmation = self.post_option_order(&request, false).await?;
        tracing::info!(
            option_symbol,
            order_id = ?confirmation.id,
            status = ?confirmation.status,
            "Close order submitted"
        );
        Ok(confirmation)
    }
}

/// Shifts a date by whole months, clamping the day like the broker's
/// month arithmetic does.
fn shift_months(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    if offset >= 0 {
        date.checked_add_months(Months::new(offset as u32))
    } else {
        date.checked_sub_months(Months::new(offset.unsigned_abs() as u32))
    }
}
