//! Coalescing queue of pending cart line operations.
//!
//! Holds at most one operation per product: a newer intent for a line
//! replaces the older one ("latest wins") and moves to the back, so the
//! queue preserves the order in which lines were last touched.

use cartsync_core::{CartLineOperation, ProductId};
use tracing::debug;

/// Pending operations awaiting the next flush.
#[derive(Debug, Default, Clone)]
pub struct OperationQueue {
    ops: Vec<CartLineOperation>,
}

impl OperationQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Queue an operation, replacing any pending one for the same product.
    pub fn enqueue(&mut self, op: CartLineOperation) {
        let before = self.ops.len();
        self.ops.retain(|queued| queued.product_id != op.product_id);
        if self.ops.len() != before {
            debug!(product_id = %op.product_id, "Coalesced pending cart operation");
        }
        self.ops.push(op);
    }

    /// Take every queued operation, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<CartLineOperation> {
        std::mem::take(&mut self.ops)
    }

    /// Put operations from a failed or superseded send back at the front.
    ///
    /// Operations queued since the snapshot are newer intents, so a returned
    /// operation is dropped when its product already has a queued entry.
    pub fn requeue_front(&mut self, returned: Vec<CartLineOperation>) {
        let mut merged: Vec<CartLineOperation> = returned
            .into_iter()
            .filter(|op| !self.contains(&op.product_id))
            .collect();
        merged.append(&mut self.ops);
        self.ops = merged;
    }

    /// Pending operation for a product, if any.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLineOperation> {
        self.ops.iter().find(|op| &op.product_id == product_id)
    }

    /// Whether a product has a pending operation.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Pending operations in queue order.
    #[must_use]
    pub fn as_slice(&self) -> &[CartLineOperation] {
        &self.ops
    }

    /// Number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    #[test]
    fn test_latest_wins() {
        let mut queue = OperationQueue::new();
        queue.enqueue(CartLineOperation::update(pid("42"), 3));
        queue.enqueue(CartLineOperation::update(pid("42"), 5));

        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.get(&pid("42")),
            Some(&CartLineOperation::update(pid("42"), 5))
        );
    }

    #[test]
    fn test_remove_replaces_update() {
        let mut queue = OperationQueue::new();
        queue.enqueue(CartLineOperation::update(pid("1"), 2));
        queue.enqueue(CartLineOperation::remove(pid("1")));

        assert_eq!(queue.as_slice(), &[CartLineOperation::remove(pid("1"))]);
    }

    #[test]
    fn test_coalesced_entry_moves_to_back() {
        let mut queue = OperationQueue::new();
        queue.enqueue(CartLineOperation::update(pid("a"), 1));
        queue.enqueue(CartLineOperation::update(pid("b"), 1));
        queue.enqueue(CartLineOperation::update(pid("a"), 2));

        let ids: Vec<&str> = queue.as_slice().iter().map(|op| op.product_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = OperationQueue::new();
        queue.enqueue(CartLineOperation::update(pid("1"), 1));
        queue.enqueue(CartLineOperation::update(pid("2"), 1));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_requeue_goes_ahead_of_new_ops() {
        let mut queue = OperationQueue::new();
        queue.enqueue(CartLineOperation::update(pid("1"), 1));
        let snapshot = queue.drain();

        queue.enqueue(CartLineOperation::update(pid("2"), 4));
        queue.requeue_front(snapshot);

        let ids: Vec<&str> = queue.as_slice().iter().map(|op| op.product_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn test_requeue_keeps_newer_intent() {
        let mut queue = OperationQueue::new();
        queue.enqueue(CartLineOperation::update(pid("42"), 3));
        let snapshot = queue.drain();

        // User kept typing while the request was in flight
        queue.enqueue(CartLineOperation::update(pid("42"), 5));
        queue.requeue_front(snapshot);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(&pid("42")).unwrap().quantity, Some(5));
    }
}
