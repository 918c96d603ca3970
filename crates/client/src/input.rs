//! Page input events.
//!
//! Quantity fields carry ids of the form `cart-qty-<product id>`; remove
//! buttons carry the product id directly.

use cartsync_core::ProductId;
use tracing::debug;

use crate::manager::CartManager;
use crate::transport::BatchTransport;

/// Element id prefix of quantity inputs.
pub const QUANTITY_INPUT_PREFIX: &str = "cart-qty-";

/// An input event from the cart page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartInput {
    /// A quantity field changed.
    QuantityInput {
        /// Id of the edited element.
        element_id: String,
        /// Raw field value.
        value: String,
    },
    /// A remove button was clicked.
    RemoveClicked {
        /// Product id from the button.
        product_id: String,
    },
}

impl CartInput {
    /// Forward the event to `manager`.
    ///
    /// Returns `false` when the event does not belong to the cart.
    pub fn dispatch<T: BatchTransport>(&self, manager: &CartManager<T>) -> bool {
        match self {
            Self::QuantityInput { element_id, value } => {
                let Some(product_id) = extract_product_id(element_id) else {
                    return false;
                };
                manager.update_quantity(&product_id, parse_quantity(value));
                true
            }
            Self::RemoveClicked { product_id } => match ProductId::parse(product_id) {
                Ok(product_id) => {
                    manager.remove_item(&product_id);
                    true
                }
                Err(e) => {
                    debug!(error = %e, "Ignoring remove click without a product id");
                    false
                }
            },
        }
    }
}

/// Product id from a quantity input's element id.
#[must_use]
pub fn extract_product_id(element_id: &str) -> Option<ProductId> {
    let raw = element_id.strip_prefix(QUANTITY_INPUT_PREFIX)?;
    ProductId::parse(raw).ok()
}

/// Quantity from a raw field value.
///
/// Leading digits are read and the rest ignored. Empty, unparsable and
/// negative values read as 0.
#[must_use]
pub fn parse_quantity(value: &str) -> u32 {
    let value = value.trim_start();
    if value.starts_with('-') {
        return 0;
    }
    let digits = value.strip_prefix('+').unwrap_or(value);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match &digits[..end] {
        "" => 0,
        number => number.parse().unwrap_or(u32::MAX),
    }
}
