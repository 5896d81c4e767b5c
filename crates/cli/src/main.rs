use clap::{Parser, Subcommand};

mod config;

use config::ConfigLoader;

use autoclose_calendar::segment_day;
use autoclose_manager::{evaluator, service};
use autoclose_tradier::TradierClient;

#[derive(Parser)]
#[command(name = "autoclose")]
#[command(about = "Closes profitable option positions while the market is open", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the close-loop service
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Show upcoming trading days from the exchange calendar
    Calendar {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Days ahead to show
        #[arg(short, long, default_value_t = 10)]
        days: usize,
    },
    /// Show open positions with current profit fractions
    Positions {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config } => run_service(&config).await?,
        Commands::Calendar { config, days } => show_calendar(&config, days).await?,
        Commands::Positions { config } => show_positions(&config).await?,
    }

    Ok(())
}

fn build_client(config_path: &str) -> anyhow::Result<(TradierClient, config::AppConfig)> {
    let app_config = ConfigLoader::load(config_path)?;
    let client = TradierClient::new(app_config.tradier.to_client_config()?)?;
    Ok((client, app_config))
}

fn today_eastern() -> chrono::NaiveDate {
    chrono::Utc::now()
        .with_timezone(&chrono_tz::US::Eastern)
        .date_naive()
}

async fn run_service(config_path: &str) -> anyhow::Result<()> {
    let (client, app_config) = build_client(config_path)?;
    service::run(client, app_config.manager).await
}

async fn show_calendar(config_path: &str, days: usize) -> anyhow::Result<()> {
    let (client, app_config) = build_client(config_path)?;

    let today = today_eastern();
    let calendar = client
        .get_market_calendar_window(
            today,
            app_config.manager.months_back,
            app_config.manager.months_forward,
        )
        .await?;

    let mut shown = 0;
    let mut date = today;
    while shown < days {
        let Ok(day) = calendar.day(date) else { break };
        if day.is_open() {
            let session = day
                .session()
                .map(|s| format!("{} - {}", s.start, s.end))
                .unwrap_or_else(|| "?".to_string());
            let segments = segment_day(day)
                .iter()
                .filter(|s| s.tradeable)
                .count();
            println!(
                "{}  open    {}  ({} tradeable segment{})",
                day.date(),
                session,
                segments,
                if segments == 1 { "" } else { "s" }
            );
        } else {
            println!("{}  closed  {}", day.date(), day.description());
        }
        shown += 1;
        date = date.succ_opt().ok_or_else(|| anyhow::anyhow!("date overflow"))?;
    }

    Ok(())
}

async fn show_positions(config_path: &str) -> anyhow::Result<()> {
    let (client, _) = build_client(config_path)?;

    let positions = client.get_account_positions().await?;
    if positions.is_empty() {
        println!("No open positions");
        return Ok(());
    }

    let symbols: Vec<String> = positions.iter().map(|p| p.symbol.clone()).collect();
    let quotes = client.get_quotes(&symbols).await?;
    let joined = evaluator::join_by_symbol(&quotes);

    for position in &positions {
        let unit_cost = position.option_unit_cost();
        let quote = joined.get(position.symbol.as_str());
        let last = quote.and_then(|q| q.last);
        let fraction = match (unit_cost, last) {
            (Some(cost), Some(last)) => evaluator::profit_fraction(cost, last),
            _ => None,
        };

        println!(
            "{:<24} qty {:>6}  cost/contract {:>8}  last {:>8}  gain {}",
            position.symbol,
            position.quantity,
            unit_cost.map_or_else(|| "-".to_string(), |c| c.to_string()),
            last.map_or_else(|| "-".to_string(), |l| l.to_string()),
            fraction.map_or_else(|| "-".to_string(), |f| format!("{:.2}%", f * rust_decimal::Decimal::from(100))),
        );
    }

    Ok(())
}
