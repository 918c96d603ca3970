//! Merges authoritative server responses back into the cart view.
//!
//! Classification ([`assess`]) runs under the manager's state lock because
//! it advances the revision; applying the result to the view happens
//! outside the lock.

use std::sync::Arc;

use cartsync_core::{BatchResponse, ClientRevision, NoticeKind, ServerNotice};
use tracing::{debug, error, instrument, warn};

use crate::notify::{MSG_UPDATE_FAILED, NoticeLevel, Notifications};
use crate::view::{CartTotals, CartView};

/// How a response relates to the client's revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Successful and at least as new as the client revision.
    Fresh,
    /// Successful but older than the client revision.
    Stale,
    /// The server refused the batch (`success: false`).
    Rejected,
}

/// Classify a response, advancing `revision` for fresh ones.
///
/// The revision never regresses and is untouched by rejected responses.
pub fn assess(response: &BatchResponse, revision: &mut ClientRevision) -> Verdict {
    if !response.success {
        return Verdict::Rejected;
    }
    if revision.advance(response.server_rev) {
        Verdict::Fresh
    } else {
        Verdict::Stale
    }
}

/// Notification level for a server notice.
#[must_use]
pub const fn notice_level(kind: NoticeKind) -> NoticeLevel {
    match kind {
        NoticeKind::StockAdjustment => NoticeLevel::Warning,
        NoticeKind::Error => NoticeLevel::Error,
        NoticeKind::Removed => NoticeLevel::Info,
    }
}

/// Applies classified responses to the view.
#[derive(Clone)]
pub struct Reconciler {
    view: Arc<dyn CartView>,
    notifications: Notifications,
}

impl Reconciler {
    /// Create a reconciler writing to `view`.
    #[must_use]
    pub fn new(view: Arc<dyn CartView>, notifications: Notifications) -> Self {
        Self {
            view,
            notifications,
        }
    }

    /// Apply a response according to its verdict.
    #[instrument(skip_all, fields(verdict = ?verdict, server_rev = %response.server_rev))]
    pub fn apply(&self, response: &BatchResponse, verdict: Verdict) {
        match verdict {
            Verdict::Rejected => self.reject(response),
            Verdict::Stale => {
                warn!("Ignoring totals from stale cart response");
                for notice in &response.notices {
                    self.notifications
                        .show(&notice.message, notice_level(notice.kind));
                }
            }
            Verdict::Fresh => self.reconcile(response),
        }
    }

    fn reject(&self, response: &BatchResponse) {
        error!(error = ?response.error, "Cart batch update rejected");
        let message = response
            .error
            .as_deref()
            .filter(|message| !message.is_empty())
            .unwrap_or(MSG_UPDATE_FAILED);
        self.notifications.show(message, NoticeLevel::Error);
    }

    fn reconcile(&self, response: &BatchResponse) {
        for notice in &response.notices {
            self.handle_notice(notice);
        }

        self.view.set_totals(CartTotals::authoritative(
            response.cart_count,
            response.total,
        ));

        for item in &response.cart.items {
            let Some(displayed) = self.view.quantity(&item.product_id) else {
                continue;
            };
            self.view.set_subtotal(&item.product_id, item.subtotal);
            if displayed != item.quantity {
                debug!(
                    product_id = %item.product_id,
                    displayed,
                    server = item.quantity,
                    "Server quantity differs from display"
                );
                self.view.set_quantity(&item.product_id, item.quantity);
            }
        }
    }

    fn handle_notice(&self, notice: &ServerNotice) {
        if let Some((product_id, quantity)) = notice.forced_quantity() {
            warn!(product_id = %product_id, quantity, "Server adjusted line quantity");
            self.view.set_quantity(product_id, quantity);
        }
        self.notifications
            .show(&notice.message, notice_level(notice.kind));
    }
}
