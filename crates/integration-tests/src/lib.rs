//! Integration tests for cartsync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! The tests need no external services: [`FakeCartServer`] serves the batch
//! endpoint in-process on an ephemeral port. It keeps a cart with per-product
//! stock limits and a revision counter, and can be told to fail, reject or
//! stall upcoming requests.
//!
//! # Test Categories
//!
//! - `batch_endpoint` - Wire format and transport error mapping
//! - `cart_batch` - Coalescing, reconciliation, retry and empty-cart flows
//! - `cart_supersede` - Cancellation of in-flight batches and follow-ups

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use cartsync_client::{
    CartManager, CartSyncConfig, Collaborators, MemoryCartView, RecordingHost, RecordingNotifier,
    SyncError,
};
use cartsync_core::{
    BatchRequest, BatchResponse, CartContents, ClientRevision, LineAction, LineState, NoticeKind,
    ProductId, ServerNotice, line_subtotal,
};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use url::Url;

/// Path the fake endpoint is served on.
pub const BATCH_PATH: &str = "/sklep/api/cart/batch/";

/// Header the fake endpoint reads the anti-forgery token from.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// A product the fake shop sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub unit_price: Decimal,
    pub stock: u32,
}

/// A batch the endpoint received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub body: BatchRequest,
    pub token: Option<String>,
}

#[derive(Debug, Default)]
struct Backend {
    catalog: HashMap<ProductId, Product>,
    cart: Vec<(ProductId, u32)>,
    revision: u64,
    fail_next: u32,
    reject_next: Option<String>,
    delay_next: Option<Duration>,
    requests: Vec<RecordedRequest>,
}

impl Backend {
    fn set_line(&mut self, product_id: &ProductId, quantity: u32) {
        self.cart.retain(|(id, _)| id != product_id);
        if quantity > 0 {
            self.cart.push((product_id.clone(), quantity));
        }
    }

    fn apply(&mut self, request: &BatchRequest) -> BatchResponse {
        let mut notices = Vec::new();

        for op in &request.ops {
            let Some(product) = self.catalog.get(&op.product_id).copied() else {
                notices.push(ServerNotice {
                    kind: NoticeKind::Error,
                    message: format!("Product {} is not available", op.product_id),
                    product_id: Some(op.product_id.clone()),
                    adjusted_quantity: None,
                });
                continue;
            };

            let wanted = match op.action {
                LineAction::Update => op.intended_quantity(),
                LineAction::Remove => 0,
            };

            if wanted > product.stock {
                self.set_line(&op.product_id, product.stock);
                notices.push(ServerNotice::stock_adjustment(
                    op.product_id.clone(),
                    product.stock,
                    format!("Only {} in stock", product.stock),
                ));
            } else {
                self.set_line(&op.product_id, wanted);
                if wanted == 0 && op.action == LineAction::Remove {
                    notices.push(ServerNotice {
                        kind: NoticeKind::Removed,
                        message: "Item removed from cart".to_string(),
                        product_id: Some(op.product_id.clone()),
                        adjusted_quantity: None,
                    });
                }
            }
        }

        self.revision += 1;
        self.snapshot(notices)
    }

    fn snapshot(&self, notices: Vec<ServerNotice>) -> BatchResponse {
        let items: Vec<LineState> = self
            .cart
            .iter()
            .map(|(product_id, quantity)| {
                let unit_price = self
                    .catalog
                    .get(product_id)
                    .map_or(Decimal::ZERO, |product| product.unit_price);
                LineState {
                    product_id: product_id.clone(),
                    quantity: *quantity,
                    subtotal: line_subtotal(unit_price, *quantity),
                }
            })
            .collect();

        BatchResponse {
            success: true,
            error: None,
            server_rev: ClientRevision::new(self.revision),
            total: items.iter().map(|line| line.subtotal).sum(),
            cart_count: items.iter().map(|line| line.quantity).sum(),
            cart: CartContents { items },
            notices,
        }
    }
}

#[derive(Clone, Default)]
struct ServerState {
    backend: Arc<Mutex<Backend>>,
}

impl ServerState {
    fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Token sent by sessions opened with [`FakeCartServer::session`].
pub const SESSION_TOKEN: &str = "session-csrf-token";

/// A client wired to a [`FakeCartServer`] with recording collaborators.
pub struct Session {
    pub manager: CartManager,
    pub view: Arc<MemoryCartView>,
    pub notifier: Arc<RecordingNotifier>,
    pub host: Arc<RecordingHost>,
}

/// In-process batch endpoint.
pub struct FakeCartServer {
    addr: SocketAddr,
    batch_url: Url,
    state: ServerState,
    task: JoinHandle<()>,
}

impl FakeCartServer {
    /// Start serving on an ephemeral localhost port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = ServerState::default();
        let app = Router::new()
            .route(BATCH_PATH, post(handle_batch))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let batch_url =
            Url::parse(&format!("http://{addr}{BATCH_PATH}")).map_err(std::io::Error::other)?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake cart server stopped");
            }
        });

        Ok(Self {
            addr,
            batch_url,
            state,
            task,
        })
    }

    /// Add a product to the catalog.
    #[must_use]
    pub fn with_product(self, product_id: &str, unit_price: Decimal, stock: u32) -> Self {
        if let Ok(product_id) = ProductId::parse(product_id) {
            self.state.backend().catalog.insert(
                product_id,
                Product {
                    unit_price,
                    stock,
                },
            );
        }
        self
    }

    /// Put a line in the server-side cart.
    #[must_use]
    pub fn with_line(self, product_id: &str, quantity: u32) -> Self {
        if let Ok(product_id) = ProductId::parse(product_id) {
            self.state.backend().set_line(&product_id, quantity);
        }
        self
    }

    /// Origin of the server, e.g. `http://127.0.0.1:41234`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Full batch endpoint URL.
    #[must_use]
    pub fn batch_url(&self) -> Url {
        self.batch_url.clone()
    }

    /// Client configuration with timings shortened for tests.
    #[must_use]
    pub fn client_config(&self) -> CartSyncConfig {
        let mut config = CartSyncConfig::new(self.batch_url());
        config.debounce = Duration::from_millis(50);
        config.row_fade = Duration::from_millis(20);
        config.empty_reload_delay = Duration::from_millis(30);
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// Open a client session whose view shows `lines` priced from the
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn session(
        &self,
        config: CartSyncConfig,
        lines: &[(&str, u32)],
    ) -> Result<Session, SyncError> {
        let view = Arc::new(MemoryCartView::new(config.currency_suffix.clone()));
        {
            let backend = self.state.backend();
            for (id, quantity) in lines {
                let Ok(product_id) = ProductId::parse(id) else {
                    continue;
                };
                let unit_price = backend
                    .catalog
                    .get(&product_id)
                    .map(|product| product.unit_price);
                view.insert_line(product_id, *quantity, unit_price);
            }
        }

        let notifier = Arc::new(RecordingNotifier::new());
        let host = Arc::new(RecordingHost::new());
        let collaborators = Collaborators::new(view.clone(), host.clone())
            .with_notifier(notifier.clone())
            .with_token_source(Arc::new(|| SESSION_TOKEN.to_string()));
        let manager = CartManager::connect(config, collaborators)?;

        Ok(Session {
            manager,
            view,
            notifier,
            host,
        })
    }

    /// Answer the next `count` requests with HTTP 500.
    pub fn fail_next(&self, count: u32) {
        self.state.backend().fail_next = count;
    }

    /// Answer the next request with `{"success": false, "error": message}`.
    pub fn reject_next(&self, message: &str) {
        self.state.backend().reject_next = Some(message.to_string());
    }

    /// Hold the next request for `delay` before answering.
    pub fn delay_next(&self, delay: Duration) {
        self.state.backend().delay_next = Some(delay);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.backend().requests.clone()
    }

    /// Server-side quantity of a line.
    #[must_use]
    pub fn quantity(&self, product_id: &str) -> Option<u32> {
        self.state
            .backend()
            .cart
            .iter()
            .find(|(id, _)| id.as_str() == product_id)
            .map(|(_, quantity)| *quantity)
    }

    /// Current server revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.backend().revision
    }
}

impl Drop for FakeCartServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[instrument(skip_all)]
async fn handle_batch(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Response {
    let token = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    debug!(ops = request.ops.len(), client_rev = %request.client_rev, "Received batch");

    let delay = {
        let mut backend = state.backend();
        backend.requests.push(RecordedRequest {
            body: request.clone(),
            token,
        });
        backend.delay_next.take()
    };

    if let Some(delay) = delay {
        debug!(delay_ms = delay.as_millis(), "Holding batch");
        tokio::time::sleep(delay).await;
    }

    let mut backend = state.backend();
    if backend.fail_next > 0 {
        backend.fail_next -= 1;
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }
    if let Some(message) = backend.reject_next.take() {
        return Json(BatchResponse::rejected(message)).into_response();
    }

    Json(backend.apply(&request)).into_response()
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
///
/// Returns whether the condition held.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
