//! Pending cart line mutations.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// What a queued operation does to its cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineAction {
    /// Set the line to an absolute quantity.
    Update,
    /// Drop the line from the cart.
    Remove,
}

/// One pending user-intended mutation for a single cart line.
///
/// Serializes to the batch endpoint's operation shape:
///
/// ```
/// use cartsync_core::{CartLineOperation, ProductId};
///
/// let op = CartLineOperation::update(ProductId::parse("42").unwrap(), 5);
/// assert_eq!(
///     serde_json::to_string(&op).unwrap(),
///     r#"{"product_id":"42","quantity":5,"action":"update"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineOperation {
    /// Line the operation applies to.
    pub product_id: ProductId,
    /// Absolute quantity (present for updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Update or remove.
    pub action: LineAction,
}

impl CartLineOperation {
    /// Set `product_id` to `quantity`.
    #[must_use]
    pub const fn update(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity: Some(quantity),
            action: LineAction::Update,
        }
    }

    /// Remove `product_id` from the cart.
    #[must_use]
    pub const fn remove(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: None,
            action: LineAction::Remove,
        }
    }

    /// Quantity the line will have once the operation is applied.
    #[must_use]
    pub fn intended_quantity(&self) -> u32 {
        match self.action {
            LineAction::Update => self.quantity.unwrap_or(0),
            LineAction::Remove => 0,
        }
    }
}
