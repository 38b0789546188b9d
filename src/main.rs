//! LazorPay session CLI
//!
//! Inspect and manage the persisted checkout session from a terminal.

use clap::{Parser, Subcommand};
use lazorpay_session::audit::AuditEntry;
use lazorpay_session::notifier::FileWatchChannel;
use lazorpay_session::{Config, FileMedium, IdentityStore, Notifier, Result, SessionReconciler};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lazorpay")]
#[command(about = "LazorPay passkey session tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the persisted session
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear the persisted session and notify other processes
    Reset,

    /// Print session changes made by other processes until Ctrl-C
    Watch,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with((!cli.json_logs).then(fmt::layer))
        .with(cli.json_logs.then(|| fmt::layer().json()))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .apply_env()?;
    config.validate()?;

    match cli.command {
        Commands::Status { json } => show_status(&config, json)?,
        Commands::Reset => reset_session(&config).await?,
        Commands::Watch => watch_session(&config).await?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> IdentityStore {
    let medium = FileMedium::from_config(&config.storage);
    tracing::debug!(path = %medium.path().display(), "Opening session storage");
    IdentityStore::with_key(Arc::new(medium), config.storage.key.clone())
}

fn show_status(config: &Config, json: bool) -> Result<()> {
    let reconciler = SessionReconciler::new(open_store(config), Notifier::local());
    reconciler.mount();

    let identity = reconciler.identity();
    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    match identity {
        Some(identity) => {
            println!("Connected: {}", identity.wallet_address);
            println!("Device:    {}", identity.device_class);
            println!(
                "Explorer:  {}",
                config.cluster.account_url(&identity.wallet_address)
            );
        }
        None => println!("No wallet connected"),
    }

    let sdk = config.sdk_settings();
    println!("Network:   {} ({})", sdk.cluster.name(), sdk.rpc_url);
    println!("Portal:    {}", sdk.portal_url);
    println!("Paymaster: {}", sdk.paymaster_url);
    Ok(())
}

async fn reset_session(config: &Config) -> Result<()> {
    let store = open_store(config);
    let previous = store.load();

    // other processes pick the change up through their file watchers
    let reconciler = SessionReconciler::new(store, Notifier::local());
    reconciler.mount();
    reconciler.reset();

    if let Some(audit) = config.audit_log() {
        let mut entry = AuditEntry::new("reset", "success").detail(json!({ "source": "cli" }));
        if let Some(identity) = &previous {
            entry = entry.wallet(identity.wallet_address.clone());
        }
        audit.record(entry).await;
    }

    match previous {
        Some(_) => println!("Session cleared"),
        None => println!("No wallet connected"),
    }
    Ok(())
}

async fn watch_session(config: &Config) -> Result<()> {
    let path = config.storage.file_path();
    let channel = FileWatchChannel::watch(&path)?;
    let reconciler = SessionReconciler::new(open_store(config), Notifier::join(channel));
    reconciler.mount();

    let _refresh = config
        .refresh_interval()
        .map(|period| reconciler.spawn_refresh_loop(period));

    let mut state = reconciler.subscribe_state();
    print_state(&state.borrow_and_update());

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(&state.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch");
                break;
            }
        }
    }

    Ok(())
}

fn print_state(state: &lazorpay_session::SessionState) {
    match state.identity() {
        Some(identity) => println!("[{}] {}", state.name(), identity.wallet_address),
        None => println!("[{}]", state.name()),
    }
}
