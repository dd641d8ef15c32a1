use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use balance_stream::logging::init_logging;
use balance_stream::{BalanceStream, ConnectionState};
use clap::Parser;
use credential_store::{CredentialProvider, StaticToken, TokenSet, TokenStore};
use tracing::{info, warn};

mod cli;

use cli::{Args, Command, WatchArgs};

/// How often the main thread checks for connection state changes
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.log_mode).context("Failed to initialize logging")?;

    match &args.command {
        Command::Watch(watch) => run_watch(&args, watch),
        Command::Login {
            token,
            refresh,
            expires,
        } => {
            let store = open_store(&args)?;
            store
                .set_tokens(&TokenSet {
                    token: Some(token.clone()),
                    refresh: refresh.clone(),
                    expires: expires.clone(),
                })
                .context("Failed to store tokens")?;
            println!("Token stored{}", describe_path(&store));
            Ok(())
        }
        Command::Logout => {
            let store = open_store(&args)?;
            store.logout().context("Failed to clear tokens")?;
            println!("Logged out{}", describe_path(&store));
            Ok(())
        }
        Command::Status => {
            let store = open_store(&args)?;
            if store.has_auth() {
                let tokens = store.tokens();
                println!(
                    "Token stored (expires: {})",
                    tokens.expires.as_deref().unwrap_or("unknown")
                );
            } else {
                println!("No token stored");
            }
            Ok(())
        }
    }
}

fn run_watch(args: &Args, watch: &WatchArgs) -> Result<()> {
    let config = watch.stream_config()?;
    info!("Watching balance at {}", config.endpoint);

    let credentials: Arc<dyn CredentialProvider> = match &watch.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => {
            let store = open_store(args)?;
            if !store.has_auth() {
                warn!("No stored token; connecting unauthenticated");
            }
            Arc::new(store)
        }
    };

    let stream = BalanceStream::start(config, credentials).context("Failed to start balance stream")?;

    let _subscription = stream.subscribe_to_balance(|balance| {
        println!(
            "balance: {} ({} micro-units)",
            balance,
            balance.as_micros()
        );
    });

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut state = stream.watch_connection_state();
    loop {
        match stop_rx.recv_timeout(STATE_POLL_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        if state.has_changed().unwrap_or(false) {
            match *state.borrow_and_update() {
                ConnectionState::Open => info!("Connected"),
                ConnectionState::Closed { retry_in } => {
                    warn!("Disconnected, retrying in {:?}", retry_in)
                }
                ConnectionState::Connecting => info!("Connecting"),
                ConnectionState::Stopped => break,
            }
        }
    }

    info!("Shutting down");
    stream.shutdown().context("Failed to stop balance stream")?;
    Ok(())
}

fn open_store(args: &Args) -> Result<TokenStore> {
    match &args.credentials {
        Some(path) => TokenStore::open(path)
            .with_context(|| format!("Failed to open credentials at {}", path.display())),
        None => TokenStore::open_default().context("Failed to open default credential store"),
    }
}

fn describe_path(store: &TokenStore) -> String {
    store
        .path()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}
