//! The cart synchronisation manager.
//!
//! [`CartManager`] ties the pieces together: edits are projected into the
//! view immediately, coalesced in the [`OperationQueue`], and flushed in
//! one batch once the user pauses. Responses are reconciled against the
//! [`ClientRevision`] so that late or out-of-order answers never regress
//! the display.
//!
//! At most one batch is in flight. A debounced flush that fires while a
//! batch is in flight is deferred until it settles; [`CartManager::flush_now`]
//! supersedes it instead, cancelling the in-flight send and carrying its
//! operations into the new batch. A superseded send never reconciles and
//! is never retried.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use cartsync_core::{BatchRequest, BatchResponse, CartLineOperation, ClientRevision, ProductId};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::config::CartSyncConfig;
use crate::error::SyncError;
use crate::notify::{
    MSG_CONNECTION_ERROR, MSG_RETRIES_EXHAUSTED, NoticeLevel, Notifications, Notifier, PageHost,
};
use crate::projector::UiProjector;
use crate::queue::OperationQueue;
use crate::reconcile::{Reconciler, assess};
use crate::scheduler::DebounceScheduler;
use crate::token::{StaticToken, TokenChain, TokenProvider};
use crate::transport::{BatchTransport, HttpTransport};
use crate::view::CartView;

/// Synchronisation state of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing pending.
    Idle,
    /// Operations are waiting for the next flush.
    Queued,
    /// A batch is in flight.
    Flushing,
}

/// Page-side collaborators of a [`CartManager`].
#[derive(Clone)]
pub struct Collaborators {
    view: Arc<dyn CartView>,
    host: Arc<dyn PageHost>,
    notifier: Option<Arc<dyn Notifier>>,
    tokens: TokenChain,
}

impl Collaborators {
    /// Collaborators with no notification surface and no token source.
    #[must_use]
    pub fn new(view: Arc<dyn CartView>, host: Arc<dyn PageHost>) -> Self {
        Self {
            view,
            host,
            notifier: None,
            tokens: TokenChain::new(),
        }
    }

    /// Use `notifier` for user messages.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Add a token source. Sources are tried in the order they are added.
    #[must_use]
    pub fn with_token_source(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.tokens = self.tokens.with(provider);
        self
    }
}

/// Batched, optimistic cart synchronisation.
///
/// Cloning is cheap; clones share one queue and one revision. Edit methods
/// must be called from within a Tokio runtime.
pub struct CartManager<T: BatchTransport = HttpTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: BatchTransport> Clone for CartManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: BatchTransport> std::fmt::Debug for CartManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.lock();
        f.debug_struct("CartManager")
            .field("pending", &core.queue.len())
            .field("revision", &core.revision)
            .field("in_flight", &core.in_flight.as_ref().map(|request| request.id))
            .finish_non_exhaustive()
    }
}

struct Inner<T> {
    config: CartSyncConfig,
    transport: Arc<T>,
    tokens: TokenChain,
    projector: UiProjector,
    reconciler: Reconciler,
    notifications: Notifications,
    core: Mutex<SyncCore>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, SyncCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct SyncCore {
    queue: OperationQueue,
    revision: ClientRevision,
    scheduler: DebounceScheduler,
    in_flight: Option<InFlightRequest>,
    follow_up: bool,
    next_request_id: u64,
    failed_attempts: u32,
}

struct InFlightRequest {
    id: u64,
    ops: Vec<CartLineOperation>,
    abort: AbortHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    Debounced,
    Supersede,
}

type SendHandle = JoinHandle<Result<BatchResponse, SyncError>>;

impl CartManager<HttpTransport> {
    /// Create a manager talking to the configured HTTP endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn connect(config: CartSyncConfig, collaborators: Collaborators) -> Result<Self, SyncError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, transport, collaborators))
    }
}

impl<T: BatchTransport> CartManager<T> {
    /// Create a manager over `transport`.
    ///
    /// A token from the configuration, if any, is used when no
    /// collaborator token source yields one.
    #[must_use]
    pub fn new(config: CartSyncConfig, transport: T, collaborators: Collaborators) -> Self {
        let Collaborators {
            view,
            host,
            notifier,
            mut tokens,
        } = collaborators;

        if let Some(token) = &config.csrf_token {
            tokens = tokens.with(Arc::new(StaticToken::new(token.clone())));
        }

        let notifications = Notifications::new(notifier, Arc::clone(&host));
        let projector = UiProjector::new(
            Arc::clone(&view),
            host,
            config.row_fade,
            config.empty_reload_delay,
        );
        let reconciler = Reconciler::new(view, notifications.clone());

        Self {
            inner: Arc::new(Inner {
                config,
                transport: Arc::new(transport),
                tokens,
                projector,
                reconciler,
                notifications,
                core: Mutex::new(SyncCore::default()),
            }),
        }
    }

    /// Set a line's quantity.
    ///
    /// The view updates immediately; the change is sent with the next
    /// batch. Quantity 0 fades and removes the row.
    pub fn update_quantity(&self, product_id: &ProductId, quantity: u32) {
        self.inner.projector.apply_optimistic(product_id, quantity);
        self.enqueue(CartLineOperation::update(product_id.clone(), quantity));
    }

    /// Remove a line.
    pub fn remove_item(&self, product_id: &ProductId) {
        self.inner.projector.apply_optimistic(product_id, 0);
        self.enqueue(CartLineOperation::remove(product_id.clone()));
    }

    /// Step a line's displayed quantity by `delta`, clamped to
    /// `0..=max_stock`. A missing or zero displayed quantity counts as 1.
    pub fn adjust_quantity(&self, product_id: &ProductId, delta: i64, max_stock: u32) {
        let current = self
            .inner
            .projector
            .view()
            .quantity(product_id)
            .filter(|&quantity| quantity > 0)
            .unwrap_or(1);
        let target = i64::from(current)
            .saturating_add(delta)
            .clamp(0, i64::from(max_stock));
        self.update_quantity(product_id, u32::try_from(target).unwrap_or(0));
    }

    /// Send queued operations.
    ///
    /// Does nothing when the queue is empty. When a batch is already in
    /// flight, a follow-up flush is scheduled for when it settles.
    pub async fn flush(&self) {
        self.run_flush(FlushMode::Debounced).await;
    }

    /// Send queued operations now, superseding any in-flight batch.
    ///
    /// The superseded batch is cancelled and its operations travel with
    /// this one, except where a newer edit for the same line is queued.
    pub async fn flush_now(&self) {
        self.run_flush(FlushMode::Supersede).await;
    }

    /// Stop the debounce timer and cancel any in-flight batch.
    ///
    /// Unsent operations stay queued.
    pub fn shutdown(&self) {
        let mut core = self.inner.lock();
        core.scheduler.cancel();
        core.follow_up = false;
        if let Some(in_flight) = core.in_flight.take() {
            in_flight.abort.abort();
            core.queue.requeue_front(in_flight.ops);
        }
        info!(pending = core.queue.len(), "Cart manager shut down");
    }

    /// Current synchronisation state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        let core = self.inner.lock();
        if core.in_flight.is_some() {
            SyncState::Flushing
        } else if core.scheduler.is_pending() || !core.queue.is_empty() {
            SyncState::Queued
        } else {
            SyncState::Idle
        }
    }

    /// Last server revision reconciled.
    #[must_use]
    pub fn revision(&self) -> ClientRevision {
        self.inner.lock().revision
    }

    /// Operations waiting for the next flush, in queue order.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<CartLineOperation> {
        self.inner.lock().queue.as_slice().to_vec()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CartSyncConfig {
        &self.inner.config
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    fn enqueue(&self, op: CartLineOperation) {
        let mut core = self.inner.lock();
        core.queue.enqueue(op);
        self.schedule_flush(&mut core, self.inner.config.debounce);
    }

    fn schedule_flush(&self, core: &mut SyncCore, delay: Duration) {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        core.scheduler.schedule(delay, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = Self { inner };
            // Run detached so restarting the timer cannot cut a flush short.
            tokio::spawn(async move { manager.flush().await });
        });
    }

    async fn run_flush(&self, mode: FlushMode) {
        let token = self.inner.tokens.token();
        let Some((request_id, handle)) = self.begin_flush(mode, token) else {
            return;
        };

        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(SyncError::from(e)),
        };
        self.settle(request_id, outcome);
    }

    fn begin_flush(&self, mode: FlushMode, token: String) -> Option<(u64, SendHandle)> {
        let mut core = self.inner.lock();

        if mode == FlushMode::Debounced && core.in_flight.is_some() {
            if !core.queue.is_empty() {
                debug!(pending = core.queue.len(), "Batch in flight, deferring flush");
                core.follow_up = true;
            }
            return None;
        }

        if let Some(previous) = core.in_flight.take() {
            previous.abort.abort();
            info!(request_id = previous.id, "Superseding in-flight cart batch");
            core.queue.requeue_front(previous.ops);
        }

        if core.queue.is_empty() {
            return None;
        }

        core.scheduler.cancel();
        core.follow_up = false;

        let ops = core.queue.drain();
        let request = BatchRequest {
            ops: ops.clone(),
            client_rev: core.revision,
        };
        core.next_request_id += 1;
        let request_id = core.next_request_id;

        debug!(
            request_id,
            ops = ops.len(),
            client_rev = %core.revision,
            "Sending cart batch"
        );

        let transport = Arc::clone(&self.inner.transport);
        let handle = tokio::spawn(async move { transport.send_batch(request, token).await });
        core.in_flight = Some(InFlightRequest {
            id: request_id,
            ops,
            abort: handle.abort_handle(),
        });

        Some((request_id, handle))
    }

    #[instrument(skip(self, outcome))]
    fn settle(&self, request_id: u64, outcome: Result<BatchResponse, SyncError>) {
        let mut core = self.inner.lock();

        let finished = match core.in_flight.take() {
            Some(in_flight) if in_flight.id == request_id => in_flight,
            other => {
                core.in_flight = other;
                debug!("Discarding result of superseded cart batch");
                return;
            }
        };

        match outcome {
            Ok(response) => {
                let verdict = assess(&response, &mut core.revision);
                core.failed_attempts = 0;

                let follow_up = std::mem::take(&mut core.follow_up) || !core.queue.is_empty();
                if follow_up && !core.scheduler.is_pending() {
                    self.schedule_flush(&mut core, self.inner.config.debounce);
                }
                drop(core);

                self.inner.reconciler.apply(&response, verdict);
            }
            Err(e) if !e.is_retryable() => {
                debug!(error = %e, "Cart batch cancelled");
                core.queue.requeue_front(finished.ops);
            }
            Err(e) => {
                core.queue.requeue_front(finished.ops);
                core.follow_up = false;
                core.failed_attempts = core.failed_attempts.saturating_add(1);
                let failures = core.failed_attempts;
                let retry = &self.inner.config.retry;

                if retry.allows_retry(failures) {
                    let delay = retry.delay_for(self.inner.config.debounce, failures);
                    warn!(
                        error = %e,
                        failures,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Cart sync failed, retrying"
                    );
                    self.schedule_flush(&mut core, delay);
                    drop(core);
                    self.inner
                        .notifications
                        .show(MSG_CONNECTION_ERROR, NoticeLevel::Warning);
                } else {
                    error!(
                        error = %e,
                        failures,
                        pending = core.queue.len(),
                        "Cart sync failed, giving up until the next edit"
                    );
                    core.failed_attempts = 0;
                    drop(core);
                    self.inner
                        .notifications
                        .show(MSG_RETRIES_EXHAUSTED, NoticeLevel::Error);
                }
            }
        }
    }
}
