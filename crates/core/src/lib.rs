//! cartsync Core - Shared cart synchronisation types.
//!
//! This crate provides the types exchanged between the storefront cart client
//! and the batch endpoint:
//! - `client` - The cart manager (queueing, debouncing, reconciliation)
//! - `cli` - Terminal driver for the cart manager
//! - `integration-tests` - End-to-end tests against a fake batch endpoint
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no timers, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, revisions, line operations, amounts
//! - [`protocol`] - Batch request/response wire format

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod protocol;
pub mod types;

pub use protocol::*;
pub use types::*;
