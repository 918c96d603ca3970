//! cartsync CLI - drive the cart manager from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Seed two lines and type commands on stdin
//! cartsync run --line 42:1:19.99 --line 7:2:4.50
//!
//! # Replay a script of edits
//! cartsync run --line 42:1:19.99 --script edits.txt
//!
//! # Show the effective configuration
//! cartsync config
//! ```
//!
//! # Commands
//!
//! - `run` - Apply cart edits against the configured batch endpoint
//! - `config` - Print the effective configuration (secrets redacted)
//!
//! # Environment Variables
//!
//! - `CART_BASE_URL` - Storefront origin (required)
//! - `SENTRY_DSN` - Enables error reporting when set
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::run::LineSeed;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Batched cart synchronisation client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply cart edits and sync them with the batch endpoint
    Run {
        /// Seed a cart line as `ID:QTY[:PRICE]` (repeatable)
        #[arg(short, long = "line", value_name = "ID:QTY[:PRICE]")]
        lines: Vec<LineSeed>,

        /// Read commands from a file instead of stdin
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|v| !v.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync=info,cartsync_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { lines, script } => {
            commands::run::execute(&lines, script.as_deref()).await?;
        }
        Commands::Config => commands::config::show()?,
    }
    Ok(())
}
