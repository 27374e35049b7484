//! Pasta Trader
//!
//! Connects to the aggregate feed and runs the momentum strategy on top of
//! the rolled-up bars.

use clap::{Parser, Subcommand};
use pasta_trader::{
    client::MarketDataClient,
    config::Config,
    handler::DataHandler,
    strategy::{ChaseMomentumStrategy, Strategy},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const API_KEY_ENV: &str = "POLYGON_API_KEY";

#[derive(Parser)]
#[command(name = "pasta-trader")]
#[command(about = "Streams aggregate bars and chases pre-market momentum")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (searches the default locations when omitted)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the feed and run until the connection ends
    Run {
        /// Close the connection as soon as the subscription is acknowledged
        #[arg(long)]
        close_after_subscribe: bool,
    },
    /// Validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        config.feed.api_key = Some(key);
    }

    match cli.command {
        Commands::Run {
            close_after_subscribe,
        } => {
            config.feed.close_after_subscribe |= close_after_subscribe;
            run(config).await
        }
        Commands::CheckConfig => check_config(config),
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => match Config::load_default() {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("{}, using built-in defaults", e);
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        },
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting pasta trader");

    let handler = Arc::new(DataHandler::new(&config.aggregation));
    let mut client = MarketDataClient::new(config.feed.clone());
    handler.attach(&mut client)?;

    let (strategy, mut signals) = ChaseMomentumStrategy::new(&handler, config.strategy.clone())?;
    strategy.init()?;

    let consumer = tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            tracing::info!(
                ticker = %signal.ticker,
                price = %signal.price,
                limit = %signal.limit_price,
                at = %signal.at,
                "Entry signal"
            );
        }
    });

    let shutdown = client.shutdown_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            shutdown.shutdown();
        }
    });

    let outcome = client.run().await;
    ctrl_c.abort();

    // The client owns the handler callback that feeds the strategy
    drop(client);
    drop(strategy);
    drop(handler);
    if let Err(e) = consumer.await {
        tracing::warn!("Signal consumer ended abnormally: {}", e);
    }

    match outcome {
        Ok(()) => {
            tracing::info!("Data client finished");
            Ok(())
        }
        Err(e) if e.is_terminal() => {
            tracing::error!("Data connection ended: {}. Restart to reconnect", e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("Data client failed: {}", e);
            Err(e.into())
        }
    }
}

fn check_config(mut config: Config) -> anyhow::Result<()> {
    config.validate()?;
    if config.feed.api_key.is_some() {
        config.feed.api_key = Some("********".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
