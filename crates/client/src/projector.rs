//! Optimistic UI updates.
//!
//! Edits are mirrored into the view synchronously, before any network
//! activity. Badge and total are recomputed as an estimate from the visible
//! lines; the reconciler later replaces them with server values in a
//! separate, whole update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cartsync_core::{ProductId, line_subtotal};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::notify::PageHost;
use crate::view::{CartTotals, CartView};

/// Writes optimistic state into the view.
#[derive(Clone)]
pub struct UiProjector {
    view: Arc<dyn CartView>,
    host: Arc<dyn PageHost>,
    row_fade: Duration,
    empty_reload_delay: Duration,
    reload_scheduled: Arc<AtomicBool>,
}

impl UiProjector {
    /// Create a projector.
    #[must_use]
    pub fn new(
        view: Arc<dyn CartView>,
        host: Arc<dyn PageHost>,
        row_fade: Duration,
        empty_reload_delay: Duration,
    ) -> Self {
        Self {
            view,
            host,
            row_fade,
            empty_reload_delay,
            reload_scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The view this projector writes to.
    #[must_use]
    pub fn view(&self) -> &Arc<dyn CartView> {
        &self.view
    }

    /// Reflect `quantity` for `product_id` immediately.
    ///
    /// Quantity 0 fades the row and removes it after the fade; once no
    /// rows remain the page is reloaded. Must be called from within a
    /// Tokio runtime.
    pub fn apply_optimistic(&self, product_id: &ProductId, quantity: u32) {
        if self
            .view
            .quantity(product_id)
            .is_some_and(|displayed| displayed != quantity)
        {
            self.view.set_quantity(product_id, quantity);
        }

        if quantity > 0 {
            if let Some(price) = self.view.unit_price(product_id).filter(|p| !p.is_zero()) {
                self.view
                    .set_subtotal(product_id, line_subtotal(price, quantity));
            }
        } else if self.view.quantity(product_id).is_some() {
            self.view.fade_line(product_id);
            self.schedule_removal(product_id.clone());
        }

        self.refresh_estimate();
    }

    /// Recompute badge and total from the visible lines.
    pub fn refresh_estimate(&self) {
        let (item_count, total) = self.view.visible_lines().iter().fold(
            (0_u32, Decimal::ZERO),
            |(count, total), line| {
                let subtotal = line
                    .unit_price
                    .map_or(Decimal::ZERO, |price| line_subtotal(price, line.quantity));
                (count.saturating_add(line.quantity), total + subtotal)
            },
        );
        self.view.set_totals(CartTotals::estimate(item_count, total));
    }

    fn schedule_removal(&self, product_id: ProductId) {
        let projector = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(projector.row_fade).await;
            projector.view.remove_line(&product_id);
            debug!(product_id = %product_id, "Removed cart row");
            projector.refresh_estimate();
            projector.check_empty();
        });
    }

    fn check_empty(&self) {
        if self.view.has_lines() || self.reload_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Cart is empty, reloading page");
        let host = Arc::clone(&self.host);
        let delay = self.empty_reload_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            host.reload();
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::RecordingHost;
    use crate::view::{MemoryCartView, TotalsSource};

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn setup() -> (Arc<MemoryCartView>, Arc<RecordingHost>, UiProjector) {
        let view = Arc::new(MemoryCartView::new("zł"));
        let host = Arc::new(RecordingHost::new());
        let projector = UiProjector::new(
            view.clone(),
            host.clone(),
            Duration::from_millis(200),
            Duration::from_millis(500),
        );
        (view, host, projector)
    }

    #[tokio::test(start_paused = true)]
    async fn test_quantity_and_subtotal_update_immediately() {
        let (view, _, projector) = setup();
        view.insert_line(pid("42"), 1, Some(Decimal::new(1999, 2)));

        projector.apply_optimistic(&pid("42"), 3);

        let line = view.line(&pid("42")).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.subtotal, Some(Decimal::new(5997, 2)));

        let state = view.snapshot();
        assert_eq!(state.badge, 3);
        assert_eq!(state.total, Some(Decimal::new(5997, 2)));
        assert_eq!(state.totals_source, Some(TotalsSource::Estimate));
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_without_price_keeps_subtotal() {
        let (view, _, projector) = setup();
        view.insert_line(pid("9"), 1, None);

        projector.apply_optimistic(&pid("9"), 4);

        let line = view.line(&pid("9")).unwrap();
        assert_eq!(line.quantity, 4);
        assert_eq!(line.subtotal, None);
        assert_eq!(view.snapshot().badge, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_fades_then_removes() {
        let (view, host, projector) = setup();
        view.insert_line(pid("1"), 1, Some(Decimal::ONE));
        view.insert_line(pid("2"), 1, Some(Decimal::ONE));

        projector.apply_optimistic(&pid("1"), 0);
        assert!(view.line(&pid("1")).unwrap().faded);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(view.line(&pid("1")).is_none());
        assert_eq!(view.snapshot().badge, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(host.reloads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_line_removal_reloads_once() {
        let (view, host, projector) = setup();
        view.insert_line(pid("1"), 2, Some(Decimal::ONE));

        projector.apply_optimistic(&pid("1"), 0);
        projector.apply_optimistic(&pid("1"), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!view.has_lines());
        assert_eq!(host.reloads(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(host.reloads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_line_only_refreshes_estimate() {
        let (view, _, projector) = setup();
        view.insert_line(pid("1"), 2, Some(Decimal::ONE));

        projector.apply_optimistic(&pid("missing"), 0);

        assert!(!view.line(&pid("1")).unwrap().faded);
        assert_eq!(view.snapshot().badge, 2);
    }
}
