//! Interactive and scripted cart sessions.
//!
//! # Usage
//!
//! ```bash
//! cartsync run --line 42:1:19.99 --line 7:2:4.50 --script edits.txt
//! ```
//!
//! # Script Commands
//!
//! One command per line; blank lines and `#` comments are skipped.
//!
//! - `set ID QTY` - Set a line's quantity
//! - `add ID DELTA MAX` - Step a line's quantity, clamped to `0..=MAX`
//! - `remove ID` - Remove a line
//! - `flush` - Send pending edits now
//! - `wait MS` - Let timers run for `MS` milliseconds
//! - `show` - Print the cart
//! - `quit` - End the session

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cartsync_client::{
    CartManager, CartSyncConfig, Collaborators, ConfigError, MemoryCartView, NoticeLevel,
    Notifier, PageHost, SyncError,
};
use cartsync_core::{ProductId, ProductIdError};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The manager could not be created.
    #[error("Sync setup error: {0}")]
    Sync(#[from] SyncError),

    /// The command source could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in a seed line or script command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command word.
    #[error("Unknown command: {0}")]
    Unknown(String),

    /// A required argument is missing.
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// Invalid product id.
    #[error("Invalid product id: {0}")]
    ProductId(#[from] ProductIdError),

    /// A numeric argument did not parse.
    #[error("Invalid {name}: {value}")]
    InvalidNumber {
        /// Argument name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

fn number<T: FromStr>(name: &'static str, value: Option<&str>) -> Result<T, CommandError> {
    let value = value.ok_or(CommandError::MissingArgument(name))?;
    value.parse().map_err(|_| CommandError::InvalidNumber {
        name,
        value: value.to_owned(),
    })
}

fn product_id(value: Option<&str>) -> Result<ProductId, CommandError> {
    Ok(ProductId::parse(
        value.ok_or(CommandError::MissingArgument("product id"))?,
    )?)
}

/// A cart line to show before the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSeed {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
}

impl FromStr for LineSeed {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let product_id = product_id(parts.next().filter(|p| !p.is_empty()))?;
        let quantity = number("quantity", parts.next())?;
        let unit_price = parts
            .next()
            .map(|price| number("price", Some(price)))
            .transpose()?;
        Ok(Self {
            product_id,
            quantity,
            unit_price,
        })
    }
}

/// One script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(ProductId, u32),
    Add {
        product_id: ProductId,
        delta: i64,
        max_stock: u32,
    },
    Remove(ProductId),
    Flush,
    Wait(Duration),
    Show,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(word) = words.next() else {
            return Err(CommandError::MissingArgument("command"));
        };

        match word.to_ascii_lowercase().as_str() {
            "set" => Ok(Self::Set(
                product_id(words.next())?,
                number("quantity", words.next())?,
            )),
            "add" => Ok(Self::Add {
                product_id: product_id(words.next())?,
                delta: number("delta", words.next())?,
                max_stock: number("max stock", words.next())?,
            }),
            "remove" => Ok(Self::Remove(product_id(words.next())?)),
            "flush" => Ok(Self::Flush),
            "wait" => Ok(Self::Wait(Duration::from_millis(number(
                "milliseconds",
                words.next(),
            )?))),
            "show" => Ok(Self::Show),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

/// Prints notifications to the terminal.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    #[allow(clippy::print_stdout)]
    fn show(&self, message: &str, level: NoticeLevel) {
        println!("[{}] {message}", level.as_str());
    }
}

/// Stands in for the browser page.
struct TerminalHost;

impl PageHost for TerminalHost {
    #[allow(clippy::print_stdout)]
    fn reload(&self) {
        println!("[page] cart is empty, reloading");
    }

    #[allow(clippy::print_stdout)]
    fn alert(&self, message: &str) {
        println!("[alert] {message}");
    }
}

/// Run a session against the configured endpoint.
///
/// Commands come from `script`, or from stdin when no script is given.
/// Pending edits are flushed before returning.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the transport cannot be
/// built, or the command source cannot be read.
#[allow(clippy::print_stdout)]
pub async fn execute(lines: &[LineSeed], script: Option<&Path>) -> Result<(), RunError> {
    let config = CartSyncConfig::from_env()?;
    info!(endpoint = %config.batch_endpoint, "Starting cart session");

    let view = Arc::new(MemoryCartView::new(config.currency_suffix.clone()));
    for line in lines {
        view.insert_line(line.product_id.clone(), line.quantity, line.unit_price);
    }

    let collaborators = Collaborators::new(view.clone(), Arc::new(TerminalHost))
        .with_notifier(Arc::new(TerminalNotifier));
    let manager = CartManager::connect(config, collaborators)?;

    print!("{}", view.render());

    match script {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            session(&manager, &view, BufReader::new(file)).await?;
        }
        None => session(&manager, &view, BufReader::new(tokio::io::stdin())).await?,
    }

    manager.flush_now().await;
    manager.shutdown();
    print!("{}", view.render());
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn session<R>(
    manager: &CartManager,
    view: &MemoryCartView,
    reader: R,
) -> Result<(), std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping command");
                continue;
            }
        };

        match command {
            Command::Set(product_id, quantity) => manager.update_quantity(&product_id, quantity),
            Command::Add {
                product_id,
                delta,
                max_stock,
            } => manager.adjust_quantity(&product_id, delta, max_stock),
            Command::Remove(product_id) => manager.remove_item(&product_id),
            Command::Flush => {
                manager.flush_now().await;
                print!("{}", view.render());
            }
            Command::Wait(duration) => {
                tokio::time::sleep(duration).await;
                print!("{}", view.render());
            }
            Command::Show => {
                print!("{}", view.render());
                println!(
                    "state: {:?}  revision: {}  pending: {}",
                    manager.state(),
                    manager.revision(),
                    manager.pending_operations().len()
                );
            }
            Command::Quit => break,
        }
    }

    Ok(())
}
