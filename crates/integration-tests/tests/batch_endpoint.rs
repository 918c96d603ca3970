//! Wire format and transport error mapping.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::routing::post;
use cartsync_client::{BatchTransport, HttpTransport, SyncError};
use cartsync_core::{BatchRequest, CartLineOperation, ClientRevision, ProductId};
use cartsync_integration_tests::{CSRF_HEADER, FakeCartServer};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use url::Url;

fn pid(s: &str) -> ProductId {
    ProductId::parse(s).unwrap()
}

fn request(ops: Vec<CartLineOperation>) -> BatchRequest {
    BatchRequest {
        ops,
        client_rev: ClientRevision::new(0),
    }
}

async fn shop() -> FakeCartServer {
    FakeCartServer::start()
        .await
        .unwrap()
        .with_product("42", Decimal::new(1999, 2), 2)
        .with_line("42", 1)
}

// =============================================================================
// Wire format
// =============================================================================

#[tokio::test]
async fn test_raw_batch_round_trip() {
    let server = shop().await;

    let body: Value = reqwest::Client::new()
        .post(server.batch_url())
        .header(CSRF_HEADER, "raw-token")
        .json(&json!({
            "ops": [{"product_id": "42", "quantity": 5, "action": "update"}],
            "client_rev": 0
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["server_rev"], json!(1));
    assert_eq!(body["cart_count"], json!(2));
    assert_eq!(body["total"], json!(39.98));
    assert_eq!(body["cart"]["items"][0]["product_id"], json!("42"));
    assert_eq!(body["cart"]["items"][0]["subtotal"], json!(39.98));
    assert_eq!(body["notices"][0]["type"], json!("stock_adjustment"));
    assert_eq!(body["notices"][0]["adjusted_quantity"], json!(2));

    assert_eq!(
        server.requests()[0].token.as_deref(),
        Some("raw-token")
    );
}

#[tokio::test]
async fn test_remove_operation_omits_quantity() {
    let server = shop().await;
    let transport = HttpTransport::with_client(
        reqwest::Client::new(),
        server.batch_url(),
        CSRF_HEADER,
    )
    .unwrap();

    let response = transport
        .send_batch(request(vec![CartLineOperation::remove(pid("42"))]), String::new())
        .await
        .unwrap();

    assert!(response.success);
    assert!(response.cart.items.is_empty());
    assert_eq!(response.cart_count, 0);

    let recorded = &server.requests()[0];
    assert_eq!(recorded.body.ops[0].quantity, None);
    assert_eq!(recorded.token, None);
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = shop().await;
    server.fail_next(1);
    let transport = HttpTransport::with_client(
        reqwest::Client::new(),
        server.batch_url(),
        CSRF_HEADER,
    )
    .unwrap();

    let err = transport
        .send_batch(request(vec![CartLineOperation::update(pid("42"), 1)]), "t".into())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Status { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_logical_rejection_is_not_a_transport_error() {
    let server = shop().await;
    server.reject_next("Invalid quantity");
    let transport = HttpTransport::with_client(
        reqwest::Client::new(),
        server.batch_url(),
        CSRF_HEADER,
    )
    .unwrap();

    let response = transport
        .send_batch(request(vec![CartLineOperation::update(pid("42"), 1)]), "t".into())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Invalid quantity"));
}

#[tokio::test]
async fn test_malformed_body_maps_to_parse_error() {
    let app = Router::new().route("/batch/", post(|| async { "<html>oops</html>" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let endpoint = Url::parse(&format!("http://{addr}/batch/")).unwrap();
    let transport =
        HttpTransport::with_client(reqwest::Client::new(), endpoint, CSRF_HEADER).unwrap();

    let err = transport
        .send_batch(request(vec![CartLineOperation::update(pid("42"), 1)]), String::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_maps_to_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = Url::parse(&format!("http://{addr}/batch/")).unwrap();
    let transport =
        HttpTransport::with_client(reqwest::Client::new(), endpoint, CSRF_HEADER).unwrap();

    let err = transport
        .send_batch(request(vec![CartLineOperation::update(pid("42"), 1)]), String::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Http(_)));
    assert!(!err.is_cancellation());
}
