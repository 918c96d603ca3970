//! End-to-end cart flows over HTTP.
//!
//! Each test starts a fresh [`FakeCartServer`] and drives a real
//! `CartManager` against it with shortened timings.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use cartsync_client::notify::{MSG_CONNECTION_ERROR, MSG_RETRIES_EXHAUSTED};
use cartsync_client::view::TotalsSource;
use cartsync_client::{CartView, NoticeLevel, RetryPolicy, SyncState};
use cartsync_core::{CartLineOperation, ClientRevision, ProductId};
use cartsync_integration_tests::{FakeCartServer, SESSION_TOKEN, wait_until};
use rust_decimal::Decimal;

const TIMEOUT: Duration = Duration::from_secs(5);

fn pid(s: &str) -> ProductId {
    ProductId::parse(s).unwrap()
}

async fn shop() -> FakeCartServer {
    FakeCartServer::start()
        .await
        .unwrap()
        .with_product("42", Decimal::new(1999, 2), 10)
        .with_product("7", Decimal::new(450, 2), 10)
        .with_line("42", 1)
        .with_line("7", 1)
}

// =============================================================================
// Coalescing
// =============================================================================

#[tokio::test]
async fn test_rapid_edits_send_one_operation() {
    let server = shop().await;
    let session = server
        .session(server.client_config(), &[("42", 1), ("7", 1)])
        .unwrap();

    session.manager.update_quantity(&pid("42"), 3);
    session.manager.update_quantity(&pid("42"), 5);
    assert_eq!(
        session.manager.pending_operations(),
        [CartLineOperation::update(pid("42"), 5)]
    );

    assert!(wait_until(TIMEOUT, || session.manager.revision() == ClientRevision::new(1)).await);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body.ops,
        [CartLineOperation::update(pid("42"), 5)]
    );
    assert_eq!(requests[0].token.as_deref(), Some(SESSION_TOKEN));
    assert_eq!(server.quantity("42"), Some(5));
}

#[tokio::test]
async fn test_server_totals_replace_estimate() {
    let server = shop().await;
    let session = server
        .session(server.client_config(), &[("42", 1), ("7", 1)])
        .unwrap();

    session.manager.update_quantity(&pid("7"), 2);
    assert_eq!(
        session.view.snapshot().totals_source,
        Some(TotalsSource::Estimate)
    );

    assert!(wait_until(TIMEOUT, || session.manager.state() == SyncState::Idle
        && session.manager.revision() == ClientRevision::new(1))
    .await);

    let state = session.view.snapshot();
    assert_eq!(state.totals_source, Some(TotalsSource::Authoritative));
    assert_eq!(state.badge, 3);
    assert_eq!(state.total, Some(Decimal::new(2899, 2)));
    assert_eq!(
        session.view.line(&pid("7")).unwrap().subtotal,
        Some(Decimal::new(900, 2))
    );
}

// =============================================================================
// Server corrections
// =============================================================================

#[tokio::test]
async fn test_stock_adjustment_overrides_optimistic_quantity() {
    let server = FakeCartServer::start()
        .await
        .unwrap()
        .with_product("42", Decimal::new(1000, 2), 2)
        .with_line("42", 1);
    let session = server
        .session(server.client_config(), &[("42", 1)])
        .unwrap();

    session.manager.update_quantity(&pid("42"), 5);
    assert_eq!(session.view.line(&pid("42")).unwrap().quantity, 5);

    assert!(wait_until(TIMEOUT, || session.manager.revision() == ClientRevision::new(1)).await);

    assert_eq!(server.requests()[0].body.ops[0].quantity, Some(5));
    assert_eq!(session.view.line(&pid("42")).unwrap().quantity, 2);
    assert_eq!(
        session.notifier.at_level(NoticeLevel::Warning),
        ["Only 2 in stock"]
    );
    assert_eq!(session.view.snapshot().total, Some(Decimal::new(2000, 2)));
}

#[tokio::test]
async fn test_rejected_batch_shows_error_without_retry() {
    let server = shop().await;
    let session = server
        .session(server.client_config(), &[("42", 1), ("7", 1)])
        .unwrap();
    server.reject_next("Invalid quantity");

    session.manager.update_quantity(&pid("42"), 3);

    assert!(wait_until(TIMEOUT, || !session
        .notifier
        .at_level(NoticeLevel::Error)
        .is_empty())
    .await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(server.requests().len(), 1);
    assert_eq!(
        session.notifier.at_level(NoticeLevel::Error),
        ["Invalid quantity"]
    );
    assert_eq!(session.manager.revision(), ClientRevision::new(0));
    assert!(session.manager.pending_operations().is_empty());
}

// =============================================================================
// Transport failure
// =============================================================================

#[tokio::test]
async fn test_server_error_requeues_and_recovers() {
    let server = shop().await;
    let session = server
        .session(server.client_config(), &[("42", 1), ("7", 1)])
        .unwrap();
    server.fail_next(1);

    session.manager.update_quantity(&pid("42"), 3);

    assert!(wait_until(TIMEOUT, || session.manager.revision() == ClientRevision::new(1)).await);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body.ops, requests[1].body.ops);
    assert_eq!(
        session.notifier.at_level(NoticeLevel::Warning),
        [MSG_CONNECTION_ERROR]
    );
    assert_eq!(server.quantity("42"), Some(3));
    assert!(session.manager.pending_operations().is_empty());
}

#[tokio::test]
async fn test_retry_limit_keeps_operations_queued() {
    let server = shop().await;
    let mut config = server.client_config();
    config.retry = RetryPolicy {
        max_attempts: Some(3),
        ..RetryPolicy::default()
    };
    let session = server.session(config, &[("42", 1), ("7", 1)]).unwrap();
    server.fail_next(3);

    session.manager.update_quantity(&pid("42"), 3);

    assert!(wait_until(TIMEOUT, || !session
        .notifier
        .at_level(NoticeLevel::Error)
        .is_empty())
    .await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(server.requests().len(), 3);
    assert_eq!(
        session.notifier.at_level(NoticeLevel::Error),
        [MSG_RETRIES_EXHAUSTED]
    );
    assert_eq!(
        session.manager.pending_operations(),
        [CartLineOperation::update(pid("42"), 3)]
    );

    // The stranded operation rides along with the next edit.
    session.manager.update_quantity(&pid("7"), 2);
    assert!(wait_until(TIMEOUT, || session.manager.revision() == ClientRevision::new(1)).await);
    assert_eq!(server.requests()[3].body.ops.len(), 2);
    assert_eq!(server.quantity("42"), Some(3));
    assert_eq!(server.quantity("7"), Some(2));
}

// =============================================================================
// Empty cart
// =============================================================================

#[tokio::test]
async fn test_removing_last_line_reloads_page() {
    let server = FakeCartServer::start()
        .await
        .unwrap()
        .with_product("42", Decimal::new(1999, 2), 10)
        .with_line("42", 2);
    let session = server
        .session(server.client_config(), &[("42", 2)])
        .unwrap();

    session.manager.remove_item(&pid("42"));
    assert!(session.view.line(&pid("42")).unwrap().faded);

    assert!(wait_until(TIMEOUT, || session.host.reloads() == 1).await);
    assert!(!session.view.has_lines());
    assert!(!session.view.snapshot().badge_visible);

    assert!(wait_until(TIMEOUT, || server.revision() == 1).await);
    assert_eq!(
        server.requests()[0].body.ops,
        [CartLineOperation::remove(pid("42"))]
    );
    assert_eq!(server.quantity("42"), None);
}

#[tokio::test]
async fn test_unknown_product_reports_error_notice() {
    let server = shop().await;
    let session = server
        .session(server.client_config(), &[("42", 1), ("7", 1)])
        .unwrap();

    session.manager.update_quantity(&pid("999"), 1);

    assert!(wait_until(TIMEOUT, || session.manager.revision() == ClientRevision::new(1)).await);
    assert_eq!(
        session.notifier.at_level(NoticeLevel::Error),
        ["Product 999 is not available"]
    );
}
