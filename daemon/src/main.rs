//! accrue: command-line front end for the mining engine.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use accrue_backend::{HttpBackend, SystemClock};
use accrue_engine::{EngineConfig, ExpiryWatcher, InitOutcome, MiningEngine, ShutdownController};
use accrue_store_lmdb::{LmdbEnvironment, LmdbKvStore};
use accrue_types::{MiningRuntimeState, Transaction, WalletBalance};
use accrue_utils::format_duration;

type Engine = MiningEngine<HttpBackend, LmdbKvStore, SystemClock>;

#[derive(Parser)]
#[command(name = "accrue", about = "Mining session and wallet client")]
struct Cli {
    /// Base URL of the mining/wallet API.
    #[arg(long, env = "ACCRUE_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bearer token for the API.
    #[arg(long, env = "ACCRUE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Directory holding the local state snapshot.
    #[arg(long, env = "ACCRUE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Retries after the first failed launch sync.
    #[arg(long, env = "ACCRUE_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ACCRUE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ACCRUE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ACCRUE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Show the mining state.
    Status,
    /// Start a mining session.
    Start,
    /// Stop the running mining session.
    Stop,
    /// Refresh and print the wallet balance.
    Balance,
    /// Move tokens between the sendable and non-sendable pools.
    Exchange {
        /// Destination pool.
        #[arg(long, value_enum)]
        to: Destination,
        amount: f64,
    },
    /// Send sendable tokens to another user.
    Send {
        target: String,
        amount: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// List ledger transactions, newest first.
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Keep checking for server-side session expiry until interrupted.
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Destination {
    Sendable,
    NonSendable,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path
                .to_str()
                .context("config path is not valid UTF-8")?;
            EngineConfig::from_toml_file(path)
                .with_context(|| format!("failed to load config from {path}"))?
        }
        None => EngineConfig::default(),
    };

    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
    }
    if cli.api_token.is_some() {
        config.api_token = cli.api_token.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(retries) = cli.max_retries {
        config.max_retries = retries;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &EngineConfig) -> anyhow::Result<Engine> {
    let env = LmdbEnvironment::open_default(&config.data_dir).with_context(|| {
        format!("failed to open data dir {}", config.data_dir.display())
    })?;
    let store = env.kv_store()?;
    let backend = HttpBackend::new(
        config.backend_url.clone(),
        config.api_token.clone(),
        config.request_timeout(),
    )?;
    Ok(MiningEngine::new(backend, store, SystemClock, config)?)
}

fn print_status(runtime: &MiningRuntimeState, display_balance: f64) {
    if runtime.is_mining {
        let id = runtime
            .session_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();
        println!("mining:        yes (session {id})");
        println!("runtime:       {}", runtime.runtime);
        println!("remaining:     {}", runtime.countdown);
        println!("earned:        {:.6}", runtime.total_earned);
    } else {
        println!("mining:        no");
    }
    println!("rate:          {:.6} / hour", runtime.mining_rate);
    println!("lifetime:      {:.6}", runtime.lifetime_earned);
    println!("balance:       {display_balance:.6}");
    println!("data:          {:?}", runtime.data_source);
    if let Some(error) = &runtime.network_error {
        println!("network error: {error}");
    }
}

fn print_balance(balance: &WalletBalance) {
    println!("sendable:      {}", balance.sendable());
    println!("non-sendable:  {}", balance.non_sendable());
    println!("pending:       {}", balance.pending());
    println!("total:         {}", balance.total());
}

fn print_transaction(tx: &Transaction) {
    let counterparty = tx.counterparty.as_deref().unwrap_or("-");
    println!(
        "{:<24} {:<13} {:>20} {:<16} {}",
        tx.id,
        format!("{:?}", tx.kind),
        tx.amount.to_string(),
        counterparty,
        tx.timestamp
    );
}

async fn run(engine: &Engine, command: Command, config: &EngineConfig) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let integration = engine.integration().await;
            print_status(&engine.runtime().await, integration.display_balance());
        }
        Command::Start => {
            engine.start().await?;
            let runtime = engine.runtime().await;
            println!(
                "mining started at {:.6} / hour for up to {}",
                runtime.mining_rate,
                format_duration(config.session_length_secs)
            );
        }
        Command::Stop => {
            let before = engine.session_history().await.len();
            engine.stop().await?;
            let history = engine.session_history().await;
            match history.last().filter(|_| history.len() > before) {
                Some(session) => println!(
                    "mining stopped: earned {:.6} in {}",
                    session.total_earned(),
                    format_duration(session.duration_ms() / 1_000)
                ),
                None => println!("not mining"),
            }
        }
        Command::Balance => {
            let balance = engine.refresh_balance().await?;
            print_balance(&balance);
        }
        Command::Exchange { to, amount } => {
            let balance = match to {
                Destination::Sendable => engine.exchange_to_sendable(amount).await?,
                Destination::NonSendable => engine.exchange_to_non_sendable(amount).await?,
            };
            print_balance(&balance);
        }
        Command::Send {
            target,
            amount,
            note,
        } => {
            let tx = engine.send_tokens(&target, amount, note.as_deref()).await?;
            println!("sent {} to {target} ({})", tx.amount, tx.id);
        }
        Command::History { page, page_size } => {
            let transactions = engine.list_transactions(page, page_size).await?;
            if transactions.is_empty() {
                println!("no transactions");
            }
            for tx in &transactions {
                print_transaction(tx);
            }
        }
        Command::Watch => {
            let shutdown = ShutdownController::new();
            let watcher = ExpiryWatcher::new(config.expiry_check_interval());
            let rx = shutdown.subscribe();
            tokio::join!(watcher.run(engine, rx), shutdown.wait_for_signal());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    accrue_utils::init_tracing(&config.log_format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    let engine = build_engine(&config)?;
    match engine.sync_on_launch().await? {
        InitOutcome::Synced => tracing::debug!("launch state synced with backend"),
        InitOutcome::Cached => tracing::debug!("launch state served from cache"),
        InitOutcome::Offline(reason) => tracing::warn!("backend unreachable: {reason}"),
    }

    let result = run(&engine, cli.command, &config).await;
    engine.shutdown().await?;
    result
}
