//! Gift-Box Channel Bot
//!
//! Watches a Telegram channel for Binance gift-box codes and trade calls.

use clap::{Parser, Subcommand};
use giftbox_bot::{
    client::{FuturesClient, GiftBoxClient, MessageSource, RewardRedeemer, TelegramSource},
    config::Config,
    dispatch::{reply_outcome, Dispatcher},
    parser,
    poller::{Poller, PollerSettings},
    server,
    store::ProcessedStore,
    types::{ActionOutcome, ParsedEvent},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "giftbox-bot")]
#[command(about = "Telegram gift-box watcher: redeems codes, mirrors trade calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poll loop and control server
    Run {
        /// Dry run mode (no redemptions, no orders, no recording)
        #[arg(long)]
        dry_run: bool,
    },
    /// Fetch a channel once and show how each message classifies
    Fetch {
        /// Channel username
        channel: String,
        /// Number of recent messages to show
        #[arg(short, long, default_value = "2")]
        limit: usize,
    },
    /// Redeem a single gift-box code
    Redeem {
        /// Code to redeem
        code: String,
    },
    /// List processed keys
    Codes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run } => run_bot(config, dry_run).await,
        Commands::Fetch { channel, limit } => fetch_channel(config, &channel, limit).await,
        Commands::Redeem { code } => redeem_code(config, &code).await,
        Commands::Codes => list_codes(config).await,
    }
}

async fn run_bot(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting gift-box bot");

    if dry_run {
        tracing::warn!("Running in DRY RUN mode - nothing will be redeemed or ordered");
    } else {
        config.require_giftbox()?;
        config.require_binance()?;
    }

    let source = Arc::new(TelegramSource::bootstrap(&config).await?);
    let redeemer = Arc::new(GiftBoxClient::new(&config.giftbox)?);
    let executor = Arc::new(FuturesClient::new(&config.binance)?);
    let store = Arc::new(ProcessedStore::load(config.processed_path()).await?);

    let dispatcher = Dispatcher::new(redeemer, executor, config.binance.default_quantity);
    let settings = PollerSettings::from_config(&config, dry_run);
    let poller = Arc::new(Poller::new(source, dispatcher, store, settings));

    // Control server runs beside the loop; a bad bind address fails startup
    let listener = server::bind(&config.server.bind).await?;
    let server_poller = poller.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(server_poller, listener).await {
            tracing::error!("Control server exited: {}", e);
        }
    });

    poller.run().await;
    Ok(())
}

async fn fetch_channel(config: Config, channel: &str, limit: usize) -> anyhow::Result<()> {
    let source = TelegramSource::bootstrap(&config).await?;
    let messages = source.fetch(channel, limit).await?;

    if messages.is_empty() {
        println!("No recent messages for {}", channel);
        return Ok(());
    }

    println!("\n📨 Last {} message(s) from {}:\n", messages.len(), channel);
    for message in messages {
        let event = parser::parse(&message.text);
        println!("[{}] {}", message.message_id, message.text);
        println!("    {}", describe(&event));
    }

    Ok(())
}

async fn redeem_code(config: Config, code: &str) -> anyhow::Result<()> {
    config.require_giftbox()?;

    let store = ProcessedStore::load(config.processed_path()).await?;
    if store.contains(code).await {
        println!("Code {} was already processed", code);
        return Ok(());
    }

    let redeemer = GiftBoxClient::new(&config.giftbox)?;
    let reply = redeemer.redeem(code).await?;
    let outcome = reply_outcome(&reply);

    match &outcome {
        ActionOutcome::Success => println!("✅ Redeemed {}", code),
        ActionOutcome::AlreadyClaimed => println!("Code {} was already claimed", code),
        ActionOutcome::FullyClaimed => println!("Gift box {} is fully claimed", code),
        ActionOutcome::Failure(reason) => println!("❌ Redemption failed: {}", reason),
    }

    if outcome.is_terminal() {
        store.record(code).await?;
    }

    Ok(())
}

async fn list_codes(config: Config) -> anyhow::Result<()> {
    let store = ProcessedStore::load(config.processed_path()).await?;
    let keys = store.keys().await;

    if keys.is_empty() {
        println!("No processed keys recorded");
        return Ok(());
    }

    println!("\n🎟  {} processed key(s):\n", keys.len());
    for key in keys {
        println!("  {}", key);
    }

    Ok(())
}

fn describe(event: &ParsedEvent) -> String {
    match event {
        ParsedEvent::RewardCode { code } => format!("gift-box code {}", code),
        ParsedEvent::TradeEntry {
            symbol,
            side,
            entry_price,
        } => format!("entry: {} {} around {}", side.as_str(), symbol, entry_price),
        ParsedEvent::StopLoss { symbol, price, pnl } => {
            format!("stop-loss: {} at {} (pnl {})", symbol, price, pnl)
        }
        ParsedEvent::TakeProfit { symbol, price, pnl } => {
            format!("take-profit: {} at {} (pnl {})", symbol, price, pnl)
        }
        ParsedEvent::Unrecognized { .. } => "unrecognized".to_string(),
    }
}
