mod types;
mod patterns;
mod exchange;
mod engine;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{load_config, BotConfig};
use crate::engine::{BotController, PaperExecutor, TradingLoop};
use crate::exchange::{HttpRelayExecutor, TradeExecutor};
use crate::types::TradingMode;

#[derive(Parser)]
#[command(name = "vault-bot")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Market-making bot for royalty vault tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "bot.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the market-making loop until Ctrl+C
    Run {
        /// Trade against the in-process paper pool instead of the relay
        #[arg(long)]
        paper: bool,
        /// Seed for reproducible trade decisions
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run a fixed number of cycles against the paper pool without delays
    Simulate {
        /// Number of trading cycles
        #[arg(short = 'n', long, default_value = "1000")]
        cycles: u64,
        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the current token price
    Price {
        /// Query the paper pool instead of the relay
        #[arg(long)]
        paper: bool,
    },
    /// Validate and print the effective configuration
    CheckConfig,
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json)?;

    info!("Vault Market Bot v0.1.0");

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run { paper, seed } => {
            run_bot(config, paper, seed).await?;
        }
        Commands::Simulate { cycles, seed } => {
            run_simulation(config, cycles, seed).await?;
        }
        Commands::Price { paper } => {
            show_price(&config, paper).await?;
        }
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            info!("Configuration is valid");
        }
    }

    Ok(())
}

fn create_executor(config: &BotConfig, mode: TradingMode) -> Result<Arc<dyn TradeExecutor>> {
    let executor: Arc<dyn TradeExecutor> = match mode {
        TradingMode::Paper => Arc::new(PaperExecutor::new(&config.paper)),
        TradingMode::Live => Arc::new(HttpRelayExecutor::new(&config.executor)?),
    };
    Ok(executor)
}

async fn run_bot(config: BotConfig, paper: bool, seed: Option<u64>) -> Result<()> {
    let mode = if paper { TradingMode::Paper } else { TradingMode::Live };
    info!("Mode: {} | token: {}", mode, config.executor.token);

    let executor = create_executor(&config, mode)?;
    let controller = Arc::new(BotController::new_running());

    // Startup failures are not retried.
    let mut trading_loop =
        TradingLoop::bootstrap(executor, &config, Arc::clone(&controller), seed).await?;

    let shutdown = Arc::clone(&controller);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            let _ = shutdown.stop().await;
        }
    });
    spawn_pause_toggle(Arc::clone(&controller))?;
    info!("Press Ctrl+C to stop");

    let result = trading_loop.run().await;

    let state = controller.get_state().await;
    println!("\n=== Session Summary ===\n{}", state);

    result?;
    Ok(())
}

/// SIGUSR1 pauses a running bot and resumes a paused one.
#[cfg(unix)]
fn spawn_pause_toggle(controller: Arc<BotController>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut toggles = signal(SignalKind::user_defined1())?;
    tokio::spawn(async move {
        while toggles.recv().await.is_some() {
            match controller.toggle_pause().await {
                Ok(status) => info!("SIGUSR1: bot is now {}", status),
                Err(e) => warn!("SIGUSR1 ignored: {}", e),
            }
        }
    });
    info!("Send SIGUSR1 to pause or resume");
    Ok(())
}

#[cfg(not(unix))]
fn spawn_pause_toggle(_controller: Arc<BotController>) -> Result<()> {
    Ok(())
}

async fn run_simulation(mut config: BotConfig, cycles: u64, seed: Option<u64>) -> Result<()> {
    config.trading.min_interval_ms = 0;
    config.trading.max_interval_ms = 0;
    config.retry.cooldown_secs = 0;

    info!("Simulating {} cycles against the paper pool", cycles);

    let pool = Arc::new(PaperExecutor::new(&config.paper));
    let executor: Arc<dyn TradeExecutor> = pool.clone();
    let controller = Arc::new(BotController::new_running());

    let mut trading_loop =
        TradingLoop::bootstrap(executor, &config, Arc::clone(&controller), seed).await?;
    let completed = trading_loop.run_cycles(cycles).await?;

    let state = controller.get_state().await;
    let snapshot = pool.snapshot().await;
    let generator = trading_loop.generator();

    println!("\n=== Simulation Results ===");
    println!("Completed:   {}/{} cycles", completed, cycles);
    println!("{}", state);
    println!("Start price: ${:.6}", config.paper.initial_price);
    println!("End price:   ${:.6}", snapshot.price);
    println!("Last seen:   ${:.6}", generator.current_price());
    println!("Base price:  ${:.6}", generator.base_price());
    println!("Trend:       {:+.6}", generator.trend());
    println!("Momentum:    {:+.6}", generator.momentum());
    println!("Pool fees:   ${:.2}", snapshot.fees_usd);

    Ok(())
}

async fn show_price(config: &BotConfig, paper: bool) -> Result<()> {
    let mode = if paper { TradingMode::Paper } else { TradingMode::Live };
    let executor = create_executor(config, mode)?;
    executor.initialize().await?;
    let price = executor.get_current_price().await?;

    println!("{} ({}): ${:.6}", config.executor.token, mode, price);
    Ok(())
}
