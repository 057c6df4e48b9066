use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest};
use gateway_tools::helpers::CALLBACK_SIGNATURE_HEADER;
use spg_engine::{
    db_types::OrderStatus,
    gateway::{ProviderStatus, TransactionStatus},
    NotificationStore,
    OrderStore,
};

use super::{helpers::*, mocks::MockGateway};
use crate::config::ServerOptions;

const SIGNATURE: &str = "5f1d0c";
const BODY: &str = r#"{"reference":"T-1","merchant_ref":"INV-1","status":"PAID"}"#;

fn callback_gateway_inner(report: TransactionStatus) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_verify_callback().returning(|_, sig| sig == SIGNATURE);
    gateway.expect_parse_callback().returning(move |_| Ok(report.clone()));
    gateway
}

/// The webhook handler clones the API onto its own task, so the mock has to be cloneable.
fn callback_gateway(report: TransactionStatus) -> MockGateway {
    let mut gateway = callback_gateway_inner(report.clone());
    gateway.expect_clone().returning(move || callback_gateway_inner(report.clone()));
    gateway
}

fn rejecting_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_verify_callback().returning(|_, _| false);
    gateway.expect_parse_callback().never();
    gateway
}

fn callback(signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook/payment")
        .insert_header((CALLBACK_SIGNATURE_HEADER, signature))
        .set_payload(BODY)
}

#[actix_web::test]
async fn paid_callback_confirms_the_order() {
    let db = prepare_db().await;
    seed_order(&db, "INV-1", "alice").await;
    seed_attempt(&db, "INV-1", "T-1").await;
    let gateway = callback_gateway(report("INV-1", "T-1", ProviderStatus::Paid));
    let (status, body) = send(&db, gateway, callback(SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("Order is PAID"), "{body}");
    assert_eq!(status_of(&db, "INV-1").await, OrderStatus::Paid);
    let history = db.fetch_status_history(&"INV-1".into()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source, "webhook");
    let notifications = db.fetch_notifications("alice").await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].url.as_deref(), Some("/orders/INV-1"));
    let attempts = db.fetch_payment_attempts(&"INV-1".into()).await.unwrap();
    assert_eq!(attempts[0].gateway_status, "PAID");
}

#[actix_web::test]
async fn bad_signature_is_rejected_and_changes_nothing() {
    let db = prepare_db().await;
    seed_order(&db, "INV-1", "alice").await;
    let mut gateway = rejecting_gateway();
    gateway.expect_clone().returning(rejecting_gateway);
    let (status, body) = send(&db, gateway, callback("forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid callback signature"), "{body}");
    assert_eq!(status_of(&db, "INV-1").await, OrderStatus::Pending);
    assert!(db.fetch_status_history(&"INV-1".into()).await.unwrap().is_empty());
    assert!(db.fetch_notifications("alice").await.unwrap().is_empty());
}

#[actix_web::test]
async fn replayed_callbacks_are_acknowledged_without_side_effects() {
    let db = prepare_db().await;
    seed_order(&db, "INV-1", "alice").await;
    seed_attempt(&db, "INV-1", "T-1").await;
    for _ in 0..3 {
        let gateway = callback_gateway(report("INV-1", "T-1", ProviderStatus::Paid));
        let (status, _) = send(&db, gateway, callback(SIGNATURE)).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(db.fetch_status_history(&"INV-1".into()).await.unwrap().len(), 1);
    assert_eq!(db.fetch_notifications("alice").await.unwrap().len(), 1);
}

#[actix_web::test]
async fn callbacks_we_cannot_apply_are_still_acknowledged() {
    let db = prepare_db().await;
    // No such order
    let gateway = callback_gateway(report("INV-404", "T-404", ProviderStatus::Paid));
    let (status, body) = send(&db, gateway, callback(SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""success":true"#), "{body}");

    // A refund has no automatic mapping
    seed_order(&db, "INV-2", "alice").await;
    let gateway = callback_gateway(report("INV-2", "T-2", ProviderStatus::Refunded));
    let (status, _) = send(&db, gateway, callback(SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_of(&db, "INV-2").await, OrderStatus::Pending);
}

#[actix_web::test]
async fn slow_callbacks_finish_in_the_background() {
    let db = prepare_db().await;
    seed_order(&db, "INV-1", "alice").await;
    seed_attempt(&db, "INV-1", "T-1").await;
    let gateway = callback_gateway(report("INV-1", "T-1", ProviderStatus::Paid));
    let options = ServerOptions { webhook_timeout: Duration::ZERO };
    let (status, body) = send_with_options(&db, gateway, options, callback(SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let mut paid = false;
    for _ in 0..50 {
        if status_of(&db, "INV-1").await == OrderStatus::Paid {
            paid = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(paid, "the callback was never applied");
    assert_eq!(db.fetch_notifications("alice").await.unwrap().len(), 1);
}
