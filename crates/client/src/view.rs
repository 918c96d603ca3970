//! The cart page as seen by the manager.
//!
//! [`CartView`] is the narrow seam between cart logic and whatever renders
//! the cart (a browser DOM adapter, a terminal, a test double). It exposes
//! the few reads the optimistic estimate needs and the writes the
//! projector and reconciler perform. [`MemoryCartView`] is an in-memory
//! implementation used by the CLI and tests.

use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cartsync_core::{ProductId, format_amount};
use rust_decimal::Decimal;

/// Where displayed totals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsSource {
    /// Client-side estimate from visible lines, pending reconciliation.
    Estimate,
    /// Values returned by the server.
    Authoritative,
}

/// Aggregate badge/total values written in one display update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    /// Item count shown on the cart badge.
    pub item_count: u32,
    /// Cart total; `None` leaves the displayed total unchanged.
    pub total: Option<Decimal>,
    /// Origin of these values.
    pub source: TotalsSource,
}

impl CartTotals {
    /// Totals reported by the server.
    #[must_use]
    pub const fn authoritative(item_count: u32, total: Decimal) -> Self {
        Self {
            item_count,
            total: Some(total),
            source: TotalsSource::Authoritative,
        }
    }

    /// Client-side estimate. A zero total is not written.
    #[must_use]
    pub fn estimate(item_count: u32, total: Decimal) -> Self {
        Self {
            item_count,
            total: (total > Decimal::ZERO).then_some(total),
            source: TotalsSource::Estimate,
        }
    }
}

/// A cart line currently on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleLine {
    /// Line product.
    pub product_id: ProductId,
    /// Value of the quantity input.
    pub quantity: u32,
    /// Unit price embedded next to the subtotal, if present.
    pub unit_price: Option<Decimal>,
}

/// Read/write access to the rendered cart.
///
/// Writes addressed to a line that is not on the page are ignored.
pub trait CartView: Send + Sync {
    /// Lines currently displayed, in page order.
    fn visible_lines(&self) -> Vec<VisibleLine>;

    /// Current quantity input value for a line.
    fn quantity(&self, product_id: &ProductId) -> Option<u32> {
        self.visible_lines()
            .into_iter()
            .find(|line| &line.product_id == product_id)
            .map(|line| line.quantity)
    }

    /// Unit price for a line.
    fn unit_price(&self, product_id: &ProductId) -> Option<Decimal> {
        self.visible_lines()
            .into_iter()
            .find(|line| &line.product_id == product_id)
            .and_then(|line| line.unit_price)
    }

    /// Whether any line is still displayed.
    fn has_lines(&self) -> bool {
        !self.visible_lines().is_empty()
    }

    /// Overwrite a line's quantity input.
    fn set_quantity(&self, product_id: &ProductId, quantity: u32);

    /// Overwrite a line's subtotal display.
    fn set_subtotal(&self, product_id: &ProductId, subtotal: Decimal);

    /// Start the removal fade on a line.
    fn fade_line(&self, product_id: &ProductId);

    /// Drop a line from the page.
    fn remove_line(&self, product_id: &ProductId);

    /// Write badge and total in one update.
    fn set_totals(&self, totals: CartTotals);
}

/// One row of a [`MemoryCartView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLine {
    /// Quantity input value.
    pub quantity: u32,
    /// Unit price data attribute.
    pub unit_price: Option<Decimal>,
    /// Displayed subtotal.
    pub subtotal: Option<Decimal>,
    /// Whether the removal fade has started.
    pub faded: bool,
}

/// Snapshot of a [`MemoryCartView`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCartState {
    /// Displayed lines keyed by product, in insertion order.
    pub lines: Vec<(ProductId, MemoryLine)>,
    /// Badge count.
    pub badge: u32,
    /// Whether the badge is shown.
    pub badge_visible: bool,
    /// Displayed cart total.
    pub total: Option<Decimal>,
    /// Source of the last totals update.
    pub totals_source: Option<TotalsSource>,
}

impl MemoryCartState {
    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut MemoryLine> {
        self.lines
            .iter_mut()
            .find(|(id, _)| id == product_id)
            .map(|(_, line)| line)
    }
}

/// In-memory cart page.
#[derive(Debug, Default)]
pub struct MemoryCartView {
    state: Mutex<MemoryCartState>,
    currency_suffix: String,
}

impl MemoryCartView {
    /// Create an empty view rendering amounts with `currency_suffix`.
    #[must_use]
    pub fn new(currency_suffix: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryCartState::default()),
            currency_suffix: currency_suffix.into(),
        }
    }

    /// Add a line as the server would have rendered it.
    pub fn insert_line(&self, product_id: ProductId, quantity: u32, unit_price: Option<Decimal>) {
        let subtotal = unit_price.map(|price| cartsync_core::line_subtotal(price, quantity));
        let mut state = self.lock();
        state.lines.retain(|(id, _)| id != &product_id);
        state.lines.push((
            product_id,
            MemoryLine {
                quantity,
                unit_price,
                subtotal,
                faded: false,
            },
        ));
        let item_count = state.lines.iter().map(|(_, line)| line.quantity).sum();
        let total = state.lines.iter().filter_map(|(_, line)| line.subtotal).sum();
        state.badge = item_count;
        state.badge_visible = item_count > 0;
        state.total = Some(total);
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> MemoryCartState {
        self.lock().clone()
    }

    /// Row for a product, if displayed.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<MemoryLine> {
        self.lock()
            .lines
            .iter()
            .find(|(id, _)| id == product_id)
            .map(|(_, line)| line.clone())
    }

    /// Plain-text rendering of the cart.
    #[must_use]
    pub fn render(&self) -> String {
        let state = self.lock();
        let mut out = String::new();

        for (id, line) in &state.lines {
            let subtotal = line.subtotal.map_or_else(
                || "-".to_string(),
                |amount| format_amount(amount, &self.currency_suffix),
            );
            let marker = if line.faded { " (removing)" } else { "" };
            let _ = writeln!(out, "  {id:<12} x{:<4} {subtotal}{marker}", line.quantity);
        }
        if state.lines.is_empty() {
            out.push_str("  (cart is empty)\n");
        }

        let total = state.total.map_or_else(
            || "-".to_string(),
            |amount| format_amount(amount, &self.currency_suffix),
        );
        let badge = if state.badge_visible {
            state.badge.to_string()
        } else {
            "hidden".to_string()
        };
        let source = match state.totals_source {
            Some(TotalsSource::Estimate) => " (estimate)",
            Some(TotalsSource::Authoritative) | None => "",
        };
        let _ = writeln!(out, "  items: {badge}  total: {total}{source}");
        out
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CartView for MemoryCartView {
    fn visible_lines(&self) -> Vec<VisibleLine> {
        self.lock()
            .lines
            .iter()
            .map(|(id, line)| VisibleLine {
                product_id: id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect()
    }

    fn set_quantity(&self, product_id: &ProductId, quantity: u32) {
        if let Some(line) = self.lock().line_mut(product_id) {
            line.quantity = quantity;
        }
    }

    fn set_subtotal(&self, product_id: &ProductId, subtotal: Decimal) {
        if let Some(line) = self.lock().line_mut(product_id) {
            line.subtotal = Some(subtotal);
        }
    }

    fn fade_line(&self, product_id: &ProductId) {
        if let Some(line) = self.lock().line_mut(product_id) {
            line.faded = true;
        }
    }

    fn remove_line(&self, product_id: &ProductId) {
        self.lock().lines.retain(|(id, _)| id != product_id);
    }

    fn set_totals(&self, totals: CartTotals) {
        let mut state = self.lock();
        state.badge = totals.item_count;
        state.badge_visible = totals.item_count > 0;
        if let Some(total) = totals.total {
            state.total = Some(total);
        }
        state.totals_source = Some(totals.source);
    }
}
