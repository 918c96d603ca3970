//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod id;
pub mod operation;
pub mod price;

pub use id::{ClientRevision, ProductId, ProductIdError};
pub use operation::{CartLineOperation, LineAction};
pub use price::{format_amount, line_subtotal};
