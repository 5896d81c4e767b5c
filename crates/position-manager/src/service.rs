//! Main service loop — watches the market calendar and closes profitable
//! option positions while the session is open.

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use autoclose_calendar::{classify_instant, idle_open, MarketCalendar, TickKind, IDLE_DORMANT};
use autoclose_tradier::TradierClient;

use crate::evaluator;
use crate::types::ManagerConfig;

/// Current wall-clock instant in exchange-local (Eastern) terms, matching
/// the calendar feed. Captured exactly once per loop iteration.
fn now_eastern() -> NaiveDateTime {
    chrono::Utc::now()
        .with_timezone(&chrono_tz::US::Eastern)
        .naive_local()
}

/// Why a run ended, if a budget was the cause.
fn budget_exhausted(
    started: Instant,
    now: Instant,
    iterations: u64,
    config: &ManagerConfig,
) -> Option<&'static str> {
    if iterations >= config.loop_limit {
        return Some("iteration budget");
    }
    if now.duration_since(started).as_secs() >= config.time_limit_secs {
        return Some("wall-clock budget");
    }
    None
}

/// Run the close-loop service.
///
/// Each iteration:
/// 1. Capture a single `now` and classify it against the calendar
/// 2. While the session is open, fetch positions and quotes, apply the
///    profit rule, and submit preview-then-execute close orders
/// 3. Sleep for the interval the classification prescribes
///
/// The loop ends cleanly when either the wall-clock or iteration budget is
/// exhausted. Only the initial calendar fetch is fatal; every later
/// brokerage error, including a failed window rebuild, is logged and the
/// loop continues after an idle.
pub async fn run(client: TradierClient, config: ManagerConfig) -> Result<()> {
    info!(
        profit_threshold = %config.profit_threshold,
        time_limit_secs = config.time_limit_secs,
        loop_limit = config.loop_limit,
        months_back = config.months_back,
        months_forward = config.months_forward,
        "Close loop started"
    );

    let mut calendar = fetch_calendar(&client, &config).await?;

    let started = Instant::now();
    let mut iterations: u64 = 0;
    let mut last_kind: Option<TickKind> = None;
    let mut just_rebuilt = false;

    loop {
        // Every tick counts against the budgets, error ticks included.
        if let Some(reason) = budget_exhausted(started, Instant::now(), iterations, &config) {
            info!(
                reason,
                iterations,
                elapsed_secs = started.elapsed().as_secs(),
                "Budget exhausted, stopping"
            );
            return Ok(());
        }
        iterations += 1;

        let now = now_eastern();

        let decision = match classify_instant(&calendar, now, 0) {
            Ok(d) => {
                just_rebuilt = false;
                d
            }
            Err(e) if e.is_window_exhaustion() && !just_rebuilt => {
                warn!(error = %e, "Ran past the calendar window, rebuilding");
                match fetch_calendar(&client, &config).await {
                    Ok(rebuilt) => {
                        calendar = rebuilt;
                        just_rebuilt = true;
                    }
                    Err(fetch_err) => {
                        error!(error = %fetch_err, "Calendar rebuild failed, will retry");
                        let delay = fetch_err
                            .retry_delay_secs()
                            .map(Duration::from_secs)
                            .unwrap_or(IDLE_DORMANT);
                        tokio::time::sleep(delay).await;
                    }
                }
                continue;
            }
            Err(e) => {
                error!(error = %e, %now, "Calendar lookup failed");
                tokio::time::sleep(IDLE_DORMANT).await;
                continue;
            }
        };

        if last_kind != Some(decision.kind) {
            info!(kind = ?decision.kind, %now, "Market state changed");
            last_kind = Some(decision.kind);
        }

        let idle = if decision.kind == TickKind::Open {
            match close_profitable_positions(&client, &config).await {
                Ok(open_positions) => idle_open(open_positions),
                Err(e) => {
                    error!(error = %e, "Trading pass failed");
                    e.retry_delay_secs()
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| idle_open(0))
                }
            }
        } else {
            // A zero idle only happens on a day whose boundaries disagree
            // with its status; never spin on it.
            decision.idle.max(Duration::from_secs(1))
        };

        tokio::time::sleep(idle).await;
    }
}

/// One open-market trading pass. Returns the number of open positions so
/// the caller can pick the idle interval.
async fn close_profitable_positions(
    client: &TradierClient,
    config: &ManagerConfig,
) -> autoclose_tradier::Result<usize> {
    let positions = client.get_account_positions().await?;
    if positions.is_empty() {
        return Ok(0);
    }

    let symbols: Vec<String> = positions.iter().map(|p| p.symbol.clone()).collect();
    let quotes = client.get_quotes(&symbols).await?;

    let joined = evaluator::join_by_symbol(&quotes);
    for symbol in evaluator::missing_quotes(&symbols, &joined) {
        warn!(symbol, "Quote response is missing a held symbol");
    }

    let decisions = evaluator::evaluate_positions(&positions, &quotes, config);
    for decision in &decisions {
        match client
            .sell_to_close(
                &decision.underlying_symbol,
                &decision.option_symbol,
                decision.quantity,
            )
            .await
        {
            Ok(confirmation) => info!(
                symbol = decision.option_symbol,
                order_id = ?confirmation.id,
                profit_fraction = %decision.profit_fraction,
                "Position close submitted"
            ),
            Err(e) => error!(
                symbol = decision.option_symbol,
                error = %e,
                "Failed to close position"
            ),
        }
    }

    Ok(positions.len())
}

/// Fetches and decodes the rolling calendar window around today.
async fn fetch_calendar(
    client: &TradierClient,
    config: &ManagerConfig,
) -> autoclose_tradier::Result<MarketCalendar> {
    let today = now_eastern().date();
    let calendar = client
        .get_market_calendar_window(today, config.months_back, config.months_forward)
        .await?;
    info!(days = calendar.len(), "Calendar window loaded");
    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use autoclose_tradier::TradierClientConfig;

    fn test_client(base_url: &str) -> TradierClient {
        let config = TradierClientConfig::sandbox()
            .with_base_url(base_url)
            .with_account_id("VA000001")
            .with_rate_limit(NonZeroU32::new(600).unwrap());
        TradierClient::with_token(config, SecretString::from("test-token")).unwrap()
    }

    /// A calendar month whose only day is long in the past, so the current
    /// instant always falls outside the loaded window.
    fn stale_month_body() -> serde_json::Value {
        serde_json::json!({
            "calendar": {
                "days": {
                    "day": {
                        "date": "2024-03-15",
                        "status": "open",
                        "description": "Market is open",
                        "open": { "start": "09:30", "end": "16:00" }
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn failed_rebuild_does_not_kill_the_loop() {
        let mock_server = MockServer::start().await;

        // Initial window load succeeds (7 month fetches for a 3/3 window),
        // every fetch after that fails.
        Mock::given(method("GET"))
            .and(path("/markets/calendar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stale_month_body()))
            .up_to_n_times(7)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/markets/calendar"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let config = ManagerConfig {
            loop_limit: 1,
            ..Default::default()
        };

        // The stale window forces a rebuild on the first tick; the rebuild
        // hits the 500. The loop must ride it out and end on its iteration
        // budget instead of surfacing the fetch error.
        let result = run(client, config).await;
        assert!(result.is_ok(), "loop died on a transient rebuild failure");

        let requests = mock_server.received_requests().await.unwrap();
        assert!(
            requests.len() > 7,
            "a rebuild fetch should have been attempted"
        );
    }

    #[test]
    fn budget_trips_on_iterations() {
        let config = ManagerConfig {
            loop_limit: 10,
            ..Default::default()
        };
        let t0 = Instant::now();
        assert_eq!(budget_exhausted(t0, t0, 9, &config), None);
        assert_eq!(budget_exhausted(t0, t0, 10, &config), Some("iteration budget"));
    }

    #[test]
    fn budget_trips_on_wall_clock() {
        let config = ManagerConfig {
            time_limit_secs: 1,
            ..Default::default()
        };
        let t0 = Instant::now();
        assert_eq!(budget_exhausted(t0, t0, 0, &config), None);
        let later = t0 + Duration::from_secs(2);
        assert_eq!(
            budget_exhausted(t0, later, 0, &config),
            Some("wall-clock budget")
        );
    }

    #[test]
    fn now_eastern_is_naive() {
        // Shape check only: the instant carries no offset.
        let now = now_eastern();
        assert!(now.and_utc().timestamp() != 0);
    }
}
