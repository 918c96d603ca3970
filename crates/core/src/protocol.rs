//! Batch endpoint wire format.
//!
//! One `POST` carries every coalesced operation plus the client's last
//! acknowledged revision:
//!
//! ```json
//! { "ops": [ { "product_id": "42", "quantity": 5, "action": "update" } ],
//!   "client_rev": 3 }
//! ```
//!
//! The response is authoritative for totals, line quantities and subtotals,
//! and may carry server-initiated corrections as notices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CartLineOperation, ClientRevision, ProductId};

/// Body of a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Coalesced operations, at most one per product.
    pub ops: Vec<CartLineOperation>,
    /// Last revision the client reconciled.
    pub client_rev: ClientRevision,
}

/// Body of a batch response.
///
/// Every field except `success` is optional on the wire so that logical
/// rejections (`{"success": false, "error": "..."}`) parse cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Whether the server applied the batch.
    pub success: bool,
    /// Server error message for rejected batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Cart revision after applying the batch.
    #[serde(default)]
    pub server_rev: ClientRevision,
    /// Authoritative cart total.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// Authoritative item count (sum of line quantities).
    #[serde(default)]
    pub cart_count: u32,
    /// Authoritative line states.
    #[serde(default)]
    pub cart: CartContents,
    /// Server corrections and messages, applied in order.
    #[serde(default)]
    pub notices: Vec<ServerNotice>,
}

impl BatchResponse {
    /// A logical rejection carrying an error message.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            server_rev: ClientRevision::default(),
            total: Decimal::ZERO,
            cart_count: 0,
            cart: CartContents::default(),
            notices: Vec::new(),
        }
    }
}

/// Cart lines as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartContents {
    /// One entry per line still in the cart.
    #[serde(default)]
    pub items: Vec<LineState>,
}

/// Server-side state of a single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineState {
    /// Line product.
    pub product_id: ProductId,
    /// Quantity the server holds.
    pub quantity: u32,
    /// Line subtotal.
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

/// Kind of server notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Requested quantity exceeded stock; the server clamped it.
    StockAdjustment,
    /// Per-line error message.
    Error,
    /// Line was removed by the server.
    Removed,
}

/// Server-emitted correction or message attached to a response.
///
/// Ephemeral: turned into a user notification, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerNotice {
    /// Notice kind.
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    /// Human-readable message.
    pub message: String,
    /// Line the notice refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    /// Corrected quantity (stock adjustments).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_quantity: Option<u32>,
}

impl ServerNotice {
    /// Stock correction for `product_id` down to `adjusted_quantity`.
    #[must_use]
    pub fn stock_adjustment(
        product_id: ProductId,
        adjusted_quantity: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: NoticeKind::StockAdjustment,
            message: message.into(),
            product_id: Some(product_id),
            adjusted_quantity: Some(adjusted_quantity),
        }
    }

    /// The forced quantity this notice imposes, if any.
    #[must_use]
    pub fn forced_quantity(&self) -> Option<(&ProductId, u32)> {
        match (self.kind, &self.product_id, self.adjusted_quantity) {
            (NoticeKind::StockAdjustment, Some(id), Some(qty)) => Some((id, qty)),
            _ => None,
        }
    }
}
