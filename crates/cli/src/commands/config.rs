//! Configuration inspection.
//!
//! # Usage
//!
//! ```bash
//! cartsync config
//! ```

use cartsync_client::{CartSyncConfig, ConfigError};

/// Print the effective configuration. The anti-forgery token is redacted.
///
/// # Errors
///
/// Returns an error if the environment does not describe a valid
/// configuration.
#[allow(clippy::print_stdout)]
pub fn show() -> Result<(), ConfigError> {
    let config = CartSyncConfig::from_env()?;
    println!("{config:#?}");
    Ok(())
}
