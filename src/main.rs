use anyhow::Context;
use clap::Parser;
use reversalbot::api::{
    BinanceClient, BinanceCredentials, BinanceSpotAccount, MarketData, OrderExecution, PaperExchange,
};
use reversalbot::config::ExecutionMode;
use reversalbot::execution::driver::log_outcome;
use reversalbot::execution::{Executor, PollingDriver};
use reversalbot::ledger::Ledger;
use reversalbot::models::InstrumentConstraints;
use reversalbot::persistence::CsvRecordStore;
use reversalbot::BotConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pivot-low reversal bot for Binance spot (paper or testnet execution)
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML). Defaults to ./reversalbot.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.log_filter.as_deref());

    let config = BotConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing::info!("🚀 ReversalBot starting");
    log_configuration(&config);

    let market = Arc::new(BinanceClient::new(&config)?);
    let constraints = load_constraints(market.as_ref(), &config).await;

    match config.exchange.mode {
        ExecutionMode::Paper => {
            tracing::info!("  Mode: paper");
            let exchange = PaperExchange::new(market.clone(), &config);
            run(&cli, &config, market, exchange, constraints).await
        }
        ExecutionMode::Testnet => {
            tracing::info!("  Mode: testnet ({})", config.exchange.base_url);
            let credentials = BinanceCredentials::from_config(&config.exchange)
                .context("Missing exchange credentials")?;
            let exchange = BinanceSpotAccount::new(market.as_ref().clone(), credentials, &config);
            run(&cli, &config, market, exchange, constraints).await
        }
    }
}

async fn run<X: OrderExecution>(
    cli: &Cli,
    config: &BotConfig,
    market: Arc<BinanceClient>,
    exchange: X,
    constraints: InstrumentConstraints,
) -> anyhow::Result<()> {
    let store = CsvRecordStore::open(&config.storage.ledger_path, &config.storage.orders_path)
        .context("Failed to open record files")?;
    let ledger = Ledger::from_entries(store.load_ledger().context("Failed to read ledger")?);

    let mut executor = Executor::new(config, market, exchange, constraints, ledger, store)
        .context("Invalid strategy parameters")?;

    if let Err(e) = executor.reconcile().await {
        tracing::warn!("Reconciliation failed ({}), starting flat", e);
    }

    if cli.once {
        let outcome = executor.run_cycle().await?;
        log_outcome(&outcome);
        return Ok(());
    }

    tracing::info!("\nPress Ctrl+C to stop...\n");

    let driver = PollingDriver::from_config(config);
    let cycles = driver
        .run_until(&mut executor, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!(
        "👋 ReversalBot stopped after {} cycles (net {:+.6})",
        cycles,
        executor.ledger().cumulative_net()
    );
    Ok(())
}

fn setup_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reversalbot=info")),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(config: &BotConfig) {
    let s = &config.strategy;
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Symbol: {} ({})", config.symbol, config.timeframe);
    tracing::info!("  Lookback: {}", s.lookback);
    if s.lookback >= 2 {
        tracing::warn!(
            "  Lookback {} leaves bar N-2 unconfirmed and the entry rule can never fire; \
             set strategy.lookback = 1 (REVERSALBOT__STRATEGY__LOOKBACK=1) to trade",
            s.lookback
        );
    }
    tracing::info!(
        "  TP/SL: {:.2}% / {:.2}%",
        s.take_profit_pct * 100.0,
        s.stop_loss_pct * 100.0
    );
    tracing::info!("  Max hold: {} min", s.max_hold_minutes);
    if let Some(drop) = s.trailing_drop_pct {
        tracing::info!("  Trailing drop: {:.2}%", drop * 100.0);
    }
    tracing::info!("  Spend: {:.2} {}", s.spend_quote, config.quote_asset);
    tracing::info!("  Fee rate: {}", s.fee_rate);
    tracing::info!("  Poll: every {}s", config.poll_interval_secs);
}

/// Keep asking the exchange until the instrument limits are known
async fn load_constraints(market: &BinanceClient, config: &BotConfig) -> InstrumentConstraints {
    loop {
        match market.instrument_constraints().await {
            Ok(constraints) => {
                tracing::info!(
                    "  Step {} | min notional {}",
                    constraints.quantity_step,
                    constraints.min_notional
                );
                return constraints;
            }
            Err(e) => {
                tracing::error!(
                    "Failed to load instrument constraints: {}; retrying in {:?}",
                    e,
                    config.error_cooldown()
                );
                tokio::time::sleep(config.error_cooldown()).await;
            }
        }
    }
}
