//! Data models for Tradier brokerage integration.
//!
//! Wire records decode exactly what the API sends; the decode seam into the
//! calendar core distinguishes "field absent, semantically valid" (no
//! premarket session that day) from "field absent, malformed response"
//! (a day record without a date). Financial values use `rust_decimal`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use autoclose_calendar::{CalendarDay, DayStatus, SessionHours};

use crate::error::{Result, TradierError};

// =============================================================================
// Calendar wire records
// =============================================================================

/// Raw session boundary times from the calendar feed, e.g. "04:00"–"09:24".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session start time string.
    pub start: Option<String>,
    /// Session end time string.
    pub end: Option<String>,
}

/// One raw day record from `GET /markets/calendar`.
///
/// Missing sub-objects are valid and mean "no session of that type".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDayRecord {
    /// ISO date, required.
    pub date: String,
    /// "open" or "closed"; anything else decodes as closed.
    pub status: String,
    /// Human-readable description, e.g. the holiday name.
    pub description: Option<String>,
    /// Premarket session boundaries.
    pub premarket: Option<SessionRecord>,
    /// Regular session boundaries.
    pub open: Option<SessionRecord>,
    /// Postmarket session boundaries.
    pub postmarket: Option<SessionRecord>,
}

impl CalendarDayRecord {
    /// Decodes this wire record into a validated [`CalendarDay`].
    ///
    /// # Errors
    /// Returns `Decode` if the date is unparseable, an open day lacks
    /// regular session times, or session boundaries are inverted.
    pub fn into_day(self) -> Result<CalendarDay> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| TradierError::decode(format!("calendar day date {:?}: {e}", self.date)))?;
        let description = self.description.unwrap_or_default();

        match DayStatus::parse(&self.status) {
            DayStatus::Closed => Ok(CalendarDay::closed(date, description)),
            DayStatus::Open => {
                let session = parse_session(date, self.open.as_ref())?.ok_or_else(|| {
                    TradierError::decode(format!("open day {date} without regular session times"))
                })?;
                let premarket = parse_session(date, self.premarket.as_ref())?;
                let postmarket = parse_session(date, self.postmarket.as_ref())?;
                CalendarDay::open(date, description, premarket, session, postmarket)
                    .map_err(|e| TradierError::decode(e.to_string()))
            }
        }
    }
}

/// Parses an optional session record. Absent record or absent boundary
/// strings are valid (no session); present-but-unparseable is not.
fn parse_session(date: NaiveDate, record: Option<&SessionRecord>) -> Result<Option<SessionHours>> {
    let Some(record) = record else {
        return Ok(None);
    };
    let (Some(start), Some(end)) = (record.start.as_deref(), record.end.as_deref()) else {
        return Ok(None);
    };
    let start = parse_time(date, start)?;
    let end = parse_time(date, end)?;
    SessionHours::new(start, end)
        .map(Some)
        .ok_or_else(|| {
            TradierError::decode(format!("inverted session {start}..{end} on {date}"))
        })
}

/// The feed writes times as "HH:MM"; tolerate seconds too.
fn parse_time(date: NaiveDate, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| TradierError::decode(format!("session time {raw:?} on {date}: {e}")))
}

// =============================================================================
// Market clock
// =============================================================================

/// Snapshot of the exchange clock from `GET /markets/clock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketClock {
    /// Current trading date.
    pub date: NaiveDate,
    /// Current state, e.g. "open", "closed", "premarket", "postmarket".
    pub state: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Wall-clock time of the next state change, "HH:MM".
    pub next_change: Option<String>,
    /// The state the market changes to next.
    pub next_state: Option<String>,
    /// Unix timestamp of the snapshot.
    pub timestamp: Option<i64>,
}

// =============================================================================
// Account types
// =============================================================================

/// An account position from `GET /accounts/{id}/positions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Broker position id.
    pub id: i64,
    /// Instrument symbol (OCC symbol for options).
    pub symbol: String,
    /// Contracts or shares held.
    pub quantity: Decimal,
    /// Total amount paid for the position.
    pub cost_basis: Decimal,
    /// When the position was opened.
    pub date_acquired: DateTime<Utc>,
}

impl Position {
    /// Effective price paid per unit (cost basis / quantity).
    #[must_use]
    pub fn unit_cost(&self) -> Option<Decimal> {
        (!self.quantity.is_zero()).then(|| self.cost_basis / self.quantity)
    }

    /// Unit cost scaled by the standard option contract multiplier of 100,
    /// comparable against a per-share option quote.
    #[must_use]
    pub fn option_unit_cost(&self) -> Option<Decimal> {
        self.unit_cost().map(|c| c / Decimal::ONE_HUNDRED)
    }
}

/// Key account balance figures from `GET /accounts/{id}/balances`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountBalances {
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub total_equity: Option<Decimal>,
    pub total_cash: Option<Decimal>,
    pub equity: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub open_pl: Option<Decimal>,
    pub close_pl: Option<Decimal>,
    pub option_long_value: Option<Decimal>,
    pub option_short_value: Option<Decimal>,
    pub pending_orders_count: Option<i64>,
}

/// An existing account order from `GET /accounts/{id}/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Broker order id.
    pub id: i64,
    /// Order class, e.g. "option" or "equity".
    pub class: Option<String>,
    /// Underlying or equity symbol.
    pub symbol: Option<String>,
    /// OCC option symbol for option orders.
    pub option_symbol: Option<String>,
    /// Side, e.g. "sell_to_close".
    pub side: Option<String>,
    /// Order quantity.
    pub quantity: Option<Decimal>,
    /// Order type, e.g. "market".
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    /// Duration, e.g. "day".
    pub duration: Option<String>,
    /// Current status, e.g. "open", "filled", "canceled".
    pub status: Option<String>,
}

impl Order {
    /// Returns true if the order can still fill.
    #[must_use]
    pub fn is_working(&self) -> bool {
        matches!(
            self.status.as_deref(),
            Some("open" | "partially_filled" | "pending")
        )
    }
}

// =============================================================================
// Quotes
// =============================================================================

/// Instrument classification on a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Stock,
    Option,
    Etf,
    Index,
    #[serde(other)]
    Other,
}

/// A market quote from `GET /markets/quotes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Instrument symbol (OCC symbol for options).
    pub symbol: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Instrument classification.
    #[serde(rename = "type")]
    pub security_type: SecurityType,
    /// Last trade price.
    pub last: Option<Decimal>,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Underlying symbol, present on option quotes.
    pub underlying: Option<String>,
    /// Strike price, present on option quotes.
    pub strike: Option<Decimal>,
    /// Contract size, usually 100.
    pub contract_size: Option<i64>,
    /// Option expiration date.
    pub expiration_date: Option<NaiveDate>,
    /// "call" or "put".
    pub option_type: Option<String>,
}

impl Quote {
    /// Returns true if this quote is for an option contract.
    #[must_use]
    pub fn is_option(&self) -> bool {
        self.security_type == SecurityType::Option
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Side of an option order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    BuyToOpen,
    BuyToClose,
    SellToOpen,
    SellToClose,
}

impl OrderSide {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyToOpen => "buy_to_open",
            Self::BuyToClose => "buy_to_close",
            Self::SellToOpen => "sell_to_open",
            Self::SellToClose => "sell_to_close",
        }
    }
}

/// Order execution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
        }
    }
}

/// How long the order stays working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDuration {
    Day,
    Gtc,
    Pre,
    Post,
}

impl OrderDuration {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Gtc => "gtc",
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// An option order to submit via `POST /accounts/{id}/orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOrderRequest {
    /// Underlying equity symbol.
    pub underlying_symbol: String,
    /// OCC option symbol.
    pub option_symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Number of contracts.
    pub quantity: u32,
    /// Execution type.
    pub order_type: OrderType,
    /// Time in force.
    pub duration: OrderDuration,
    /// Limit price, required for limit and stop-limit orders.
    pub price: Option<Decimal>,
    /// Stop price, required for stop and stop-limit orders.
    pub stop: Option<Decimal>,
    /// Optional order tag.
    pub tag: Option<String>,
}

impl OptionOrderRequest {
    /// A day market order closing a long option position.
    #[must_use]
    pub fn sell_to_close(
        underlying_symbol: impl Into<String>,
        option_symbol: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            underlying_symbol: underlying_symbol.into(),
            option_symbol: option_symbol.into(),
            side: OrderSide::SellToClose,
            quantity,
            order_type: OrderType::Market,
            duration: OrderDuration::Day,
            price: None,
            stop: None,
            tag: None,
        }
    }

    /// Form-encoded body for submission. `preview=true` asks the broker to
    /// validate without executing; the API requires a successful preview
    /// before a live order is accepted.
    #[must_use]
    pub fn to_form(&self, preview: bool) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("class", "option".to_string()),
            ("symbol", self.underlying_symbol.clone()),
            ("option_symbol", self.option_symbol.clone()),
            ("side", self.side.as_str().to_string()),
            ("quantity", self.quantity.to_string()),
            ("type", self.order_type.as_str().to_string()),
            ("duration", self.duration.as_str().to_string()),
        ];
        if let Some(price) = self.price {
            form.push(("price", price.to_string()));
        }
        if let Some(stop) = self.stop {
            form.push(("stop", stop.to_string()));
        }
        if let Some(tag) = &self.tag {
            form.push(("tag", tag.clone()));
        }
        if preview {
            form.push(("preview", "true".to_string()));
        }
        form
    }
}

/// Broker response to an order submission or preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// Order id — assigned on live submission, absent on previews.
    pub id: Option<u64>,
    /// "ok" when accepted.
    pub status: Option<String>,
    /// Estimated commission (previews).
    pub commission: Option<Decimal>,
    /// Estimated total cost (previews).
    pub cost: Option<Decimal>,
}

impl OrderConfirmation {
    /// Returns true if the broker accepted the order or preview.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(status: &str) -> CalendarDayRecord {
        CalendarDayRecord {
            date: "2024-03-15".to_string(),
            status: status.to_string(),
            description: Some("Market is open".to_string()),
            premarket: Some(SessionRecord {
                start: Some("04:00".to_string()),
                end: Some("09:30".to_string()),
            }),
            open: Some(SessionRecord {
                start: Some("09:30".to_string()),
                end: Some("16:00".to_string()),
            }),
            postmarket: Some(SessionRecord {
                start: Some("16:00".to_string()),
                end: Some("20:00".to_string()),
            }),
        }
    }

    #[test]
    fn open_record_decodes_to_open_day() {
        let day = record("open").into_day().unwrap();
        assert!(day.is_open());
        assert_eq!(
            day.market_open().unwrap().time(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
    }

    #[test]
    fn closed_record_decodes_without_sessions() {
        let mut rec = record("closed");
        rec.premarket = None;
        rec.open = None;
        rec.postmarket = None;
        let day = rec.into_day().unwrap();
        assert!(!day.is_open());
    }

    #[test]
    fn unknown_status_decodes_as_closed() {
        let day = record("holiday-halt").into_day().unwrap();
        assert!(!day.is_open());
    }

    #[test]
    fn open_day_without_session_times_is_malformed() {
        let mut rec = record("open");
        rec.open = None;
        let err = rec.into_day().unwrap_err();
        assert!(matches!(err, TradierError::Decode(_)));
    }

    #[test]
    fn missing_premarket_is_valid() {
        let mut rec = record("open");
        rec.premarket = None;
        rec.postmarket = None;
        let day = rec.into_day().unwrap();
        assert!(day.premarket().is_none());
        assert!(day.postmarket().is_none());
    }

    #[test]
    fn garbage_date_is_malformed() {
        let mut rec = record("open");
        rec.date = "03/15/2024".to_string();
        assert!(matches!(rec.into_day(), Err(TradierError::Decode(_))));
    }

    #[test]
    fn seconds_in_session_times_tolerated() {
        let mut rec = record("open");
        rec.open = Some(SessionRecord {
            start: Some("09:30:00".to_string()),
            end: Some("16:00:00".to_string()),
        });
        assert!(rec.into_day().is_ok());
    }

    #[test]
    fn position_unit_costs() {
        let pos = Position {
            id: 1,
            symbol: "SPY240315C00500000".to_string(),
            quantity: dec!(5),
            cost_basis: dec!(500),
            date_acquired: Utc::now(),
        };
        assert_eq!(pos.unit_cost(), Some(dec!(100)));
        assert_eq!(pos.option_unit_cost(), Some(dec!(1)));
    }

    #[test]
    fn zero_quantity_has_no_unit_cost() {
        let pos = Position {
            id: 1,
            symbol: "SPY".to_string(),
            quantity: Decimal::ZERO,
            cost_basis: dec!(500),
            date_acquired: Utc::now(),
        };
        assert_eq!(pos.unit_cost(), None);
    }

    #[test]
    fn quote_type_deserializes() {
        let quote: Quote = serde_json::from_value(serde_json::json!({
            "symbol": "SPY240315C00500000",
            "description": "SPY Mar 15 2024 $500.00 Call",
            "type": "option",
            "last": 1.25,
            "underlying": "SPY",
            "strike": 500.0,
            "contract_size": 100,
            "expiration_date": "2024-03-15",
            "option_type": "call"
        }))
        .unwrap();
        assert!(quote.is_option());
        assert_eq!(quote.last, Some(dec!(1.25)));
    }

    #[test]
    fn unknown_security_type_is_other() {
        let quote: Quote = serde_json::from_value(serde_json::json!({
            "symbol": "XYZ",
            "type": "warrant"
        }))
        .unwrap();
        assert_eq!(quote.security_type, SecurityType::Other);
        assert!(!quote.is_option());
    }

    #[test]
    fn sell_to_close_form_encoding() {
        let req = OptionOrderRequest::sell_to_close("SPY", "SPY240315C00500000", 5);
        let preview = req.to_form(true);
        assert!(preview.contains(&("class", "option".to_string())));
        assert!(preview.contains(&("side", "sell_to_close".to_string())));
        assert!(preview.contains(&("quantity", "5".to_string())));
        assert!(preview.contains(&("preview", "true".to_string())));

        let live = req.to_form(false);
        assert!(!live.iter().any(|(k, _)| *k == "preview"));
    }

    #[test]
    fn order_confirmation_acceptance() {
        let ok = OrderConfirmation {
            id: Some(257_459),
            status: Some("ok".to_string()),
            commission: None,
            cost: None,
        };
        assert!(ok.accepted());

        let rejected = OrderConfirmation {
            id: None,
            status: Some("error".to_string()),
            commission: None,
            cost: None,
        };
        assert!(!rejected.accepted());
    }

    #[test]
    fn working_order_detection() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": 228_175,
            "class": "option",
            "symbol": "SPY",
            "option_symbol": "SPY240315C00500000",
            "side": "sell_to_close",
            "quantity": 5.0,
            "type": "market",
            "duration": "day",
            "status": "open"
        }))
        .unwrap();
        assert!(order.is_working());
    }
}
