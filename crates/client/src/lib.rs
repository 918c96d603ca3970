//! cartsync client - batched, optimistic cart synchronisation.
//!
//! Edits to cart lines are shown immediately, coalesced per product and
//! sent to the batch endpoint in one request once the user pauses. Server
//! responses are reconciled into the view, including server-driven
//! corrections such as stock adjustments.
//!
//! The page is reached through traits ([`view::CartView`],
//! [`notify::Notifier`], [`notify::PageHost`], [`token::TokenProvider`]) and
//! the network through [`transport::BatchTransport`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cartsync_client::{CartManager, CartSyncConfig, Collaborators, MemoryCartView, RecordingHost};
//! use cartsync_core::ProductId;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CartSyncConfig::from_env()?;
//! let view = Arc::new(MemoryCartView::new(config.currency_suffix.clone()));
//! let manager = CartManager::connect(config, Collaborators::new(view, Arc::new(RecordingHost::new())))?;
//!
//! manager.update_quantity(&ProductId::parse("42")?, 3);
//! manager.flush_now().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod input;
pub mod manager;
pub mod notify;
pub mod projector;
pub mod queue;
pub mod reconcile;
pub mod scheduler;
pub mod token;
pub mod transport;
pub mod view;

pub use config::{CartSyncConfig, ConfigError, RetryPolicy};
pub use error::SyncError;
pub use input::CartInput;
pub use manager::{CartManager, Collaborators, SyncState};
pub use notify::{NoticeLevel, Notifier, PageHost, RecordingHost, RecordingNotifier};
pub use token::{StaticToken, TokenChain, TokenProvider};
pub use transport::{BatchTransport, HttpTransport};
pub use view::{CartTotals, CartView, MemoryCartView};
