use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use spg_common::Money;
use spg_engine::{
    db_types::{OrderStatus, PaymentMethod},
    gateway::{GatewayError, ProviderStatus, TransactionInstructions},
    NotificationStore,
    OrderStore,
};

use super::{helpers::*, mocks::MockGateway};

fn post(path: &str, subject: &str) -> TestRequest {
    TestRequest::post().uri(path).insert_header(bearer(&valid_token(subject)))
}

fn get(path: &str, subject: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header(bearer(&valid_token(subject)))
}

fn paying_gateway(number: &'static str, reference: &'static str) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().returning(move |_| Ok(report(number, reference, ProviderStatus::Paid)));
    gateway
}

//----------------------------------------------   Check status  ----------------------------------------------------
#[actix_web::test]
async fn check_status_updates_a_paid_order() {
    let db = prepare_db().await;
    seed_order(&db, "INV-100", "alice").await;
    seed_attempt(&db, "INV-100", "T-100").await;
    let gateway = paying_gateway("INV-100", "T-100");
    let (status, body) = send(&db, gateway, post("/api/orders/INV-100/check-status", "alice")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "PAID");
    assert_eq!(body["updated"], true);
    assert_eq!(body["message"], "Updated to PAID");
    assert_eq!(status_of(&db, "INV-100").await, OrderStatus::Paid);
    assert_eq!(db.fetch_notifications("alice").await.unwrap().len(), 1);

    // A second check is a no-op
    let gateway = paying_gateway("INV-100", "T-100");
    let (status, body) = send(&db, gateway, post("/api/orders/INV-100/check-status", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["updated"], false);
    assert_eq!(body["message"], "Order is PAID");
    assert_eq!(db.fetch_notifications("alice").await.unwrap().len(), 1);
}

#[actix_web::test]
async fn check_status_while_provider_is_down_says_try_later() {
    let db = prepare_db().await;
    seed_order(&db, "INV-101", "alice").await;
    seed_attempt(&db, "INV-101", "T-101").await;
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().returning(|_| Err(GatewayError::Unavailable("502 Bad Gateway".into())));
    let (status, body) = send(&db, gateway, post("/api/orders/INV-101/check-status", "alice")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["updated"], false);
    assert_eq!(body["message"], "Still pending, try again later");
    assert_eq!(status_of(&db, "INV-101").await, OrderStatus::Pending);
}

#[actix_web::test]
async fn check_status_before_any_payment() {
    let db = prepare_db().await;
    seed_order(&db, "INV-102", "alice").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_query_status_for_order()
        .returning(|n| Err(GatewayError::TransactionNotFound(n.as_str().to_string())));
    let (status, body) = send(&db, gateway, post("/api/orders/INV-102/check-status", "alice")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("Still pending, try again later"));
}

#[actix_web::test]
async fn users_cannot_check_other_users_orders() {
    let db = prepare_db().await;
    seed_order(&db, "INV-103", "alice").await;
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().never();
    let (status, _) = send(&db, gateway, post("/api/orders/INV-103/check-status", "bob")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&db, MockGateway::new(), get("/api/orders/INV-103", "bob")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // Admins can see everything
    let (status, body) = send(&db, MockGateway::new(), get("/api/orders/INV-103", "root")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["order_number"], "INV-103");
    assert_eq!(body["owner_id"], "alice");
}

#[actix_web::test]
async fn missing_order_is_404() {
    let db = prepare_db().await;
    let (status, body) = send(&db, MockGateway::new(), post("/api/orders/NOPE/check-status", "alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("does not exist"), "{body}");
}

//----------------------------------------------   Pay  ----------------------------------------------------
#[actix_web::test]
async fn pay_for_order_returns_instructions() {
    let db = prepare_db().await;
    seed_order(&db, "INV-200", "alice").await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_transaction().times(1).returning(|order, method, email| {
        assert_eq!(email, "alice@example.com");
        assert_eq!(order.amount_due(), Money::from_major(162_000));
        Ok(TransactionInstructions {
            reference: "T-200".into(),
            method,
            status: ProviderStatus::Unpaid,
            pay_code: Some("8808123456789".into()),
            checkout_url: None,
            expires_at: Some(Utc::now() + Duration::hours(24)),
        })
    });
    let req = post("/api/orders/INV-200/pay", "alice").set_json(json!({ "method": "BRIVA" }));
    let (status, body) = send(&db, gateway, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["outcome"], "payment_created");
    assert_eq!(body["instructions"]["reference"], "T-200");
    assert_eq!(body["instructions"]["pay_code"], "8808123456789");
    let attempts = db.fetch_payment_attempts(&"INV-200".into()).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].method, PaymentMethod::BriVa);
}

#[actix_web::test]
async fn pay_with_an_unknown_method_is_a_bad_request() {
    let db = prepare_db().await;
    seed_order(&db, "INV-201", "alice").await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_transaction().never();
    let req = post("/api/orders/INV-201/pay", "alice").set_json(json!({ "method": "BITCOIN" }));
    let (status, body) = send(&db, gateway, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Unknown payment method"), "{body}");
}

#[actix_web::test]
async fn pay_with_a_duplicate_invoice_for_a_paid_order() {
    let db = prepare_db().await;
    seed_order(&db, "INV-202", "alice").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_transaction()
        .returning(|_, _, _| Err(GatewayError::DuplicateInvoice("Merchant ref already used".into())));
    gateway
        .expect_query_status_for_order()
        .returning(|_| Ok(report("INV-202", "T-202", ProviderStatus::Settled)));
    let req = post("/api/orders/INV-202/pay", "alice").set_json(json!({ "method": "qris" }));
    let (status, body) = send(&db, gateway, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["outcome"], "already_paid");
    assert_eq!(body["order"]["status"], "PAID");
    assert_eq!(status_of(&db, "INV-202").await, OrderStatus::Paid);
}

#[actix_web::test]
async fn cancelled_orders_cannot_be_paid() {
    let db = prepare_db().await;
    seed_order(&db, "INV-203", "alice").await;
    db.compare_and_set_status(&"INV-203".into(), OrderStatus::Pending, OrderStatus::Cancelled, "test").await.unwrap();
    let req = post("/api/orders/INV-203/pay", "alice").set_json(json!({ "method": "QRIS" }));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

//----------------------------------------------   History  ----------------------------------------------------
#[actix_web::test]
async fn history_lists_every_transition() {
    let db = prepare_db().await;
    seed_order(&db, "INV-300", "alice").await;
    seed_attempt(&db, "INV-300", "T-300").await;
    let (status, _) =
        send(&db, paying_gateway("INV-300", "T-300"), post("/api/orders/INV-300/check-status", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    let req = post("/api/admin/orders/INV-300/status", "root").set_json(json!({ "status": "processing" }));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&db, MockGateway::new(), get("/api/orders/INV-300/history", "alice")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    let history = body.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["old_status"], "PENDING");
    assert_eq!(history[0]["new_status"], "PAID");
    assert_eq!(history[0]["source"], "manual_check");
    assert_eq!(history[1]["new_status"], "PROCESSING");
    assert_eq!(history[1]["source"], "admin_override");
}

//----------------------------------------------   Admin  ----------------------------------------------------
#[actix_web::test]
async fn only_admins_can_set_status() {
    let db = prepare_db().await;
    seed_order(&db, "INV-400", "alice").await;
    let req = post("/api/admin/orders/INV-400/status", "alice").set_json(json!({ "status": "CANCELLED" }));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(status_of(&db, "INV-400").await, OrderStatus::Pending);

    let req = post("/api/admin/orders/INV-400/status", "root").set_json(json!({ "status": "CANCELLED" }));
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["updated"], true);
    assert_eq!(body["status"], "CANCELLED");
}

#[actix_web::test]
async fn admins_cannot_break_the_state_machine() {
    let db = prepare_db().await;
    seed_order(&db, "INV-401", "alice").await;
    db.compare_and_set_status(&"INV-401".into(), OrderStatus::Pending, OrderStatus::Cancelled, "test").await.unwrap();
    let req = post("/api/admin/orders/INV-401/status", "root").set_json(json!({ "status": "PAID" }));
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Unable to update order"), "{body}");
    assert_eq!(status_of(&db, "INV-401").await, OrderStatus::Cancelled);

    let req = post("/api/admin/orders/INV-401/status", "root").set_json(json!({ "status": "LOST_IN_TRANSIT" }));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
