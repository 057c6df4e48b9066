use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::{DateTime, Days, Utc};
use log::debug;
use spg_common::Money;
use spg_engine::{
    db_types::{NewOrder, NewPaymentAttempt, Order, OrderStatus, PaymentMethod, Role},
    events::EventProducers,
    gateway::{ProviderStatus, TransactionStatus},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    NotificationDispatcher,
    OrderStore,
    ReconciliationApi,
    ReconciliationOptions,
    SqliteDatabase,
};
use tari_jwt::{
    jwt_compact::{AlgorithmExt, Claims},
    tari_crypto::{
        ristretto::{RistrettoPublicKey, RistrettoSecretKey},
        tari_utilities::hex::Hex,
    },
    Ristretto256,
    Ristretto256SigningKey,
    Ristretto256VerifyingKey,
};

use super::mocks::MockGateway;
use crate::{
    auth::{AccessClaims, IdentityResolver},
    config::{AuthConfig, ServerOptions},
    routes::configure_routes,
};

pub const ISSUER: &str = "https://accounts.example.com";
pub const AUDIENCE: &str = "shop";

// Test keys for issuing tokens. DO NOT re-use these keys anywhere.
pub fn signing_key() -> Ristretto256SigningKey {
    Ristretto256SigningKey(
        RistrettoSecretKey::from_hex("925842e11914fdd0c9a2ab8a38dac9de57b3e392372cde1661b1a84b1d8e430e").unwrap(),
    )
}

pub fn verifying_key() -> Ristretto256VerifyingKey {
    Ristretto256VerifyingKey(
        RistrettoPublicKey::from_hex("b4db54f75421a02b0d0056fb7203df23c742b25e41283976bdaa7fe63de1ad23").unwrap(),
    )
}

pub fn get_auth_config() -> AuthConfig {
    AuthConfig { issuer: ISSUER.into(), audience: AUDIENCE.into(), verification_keys: vec![verifying_key()] }
}

pub fn issue_token_with_key(claims: AccessClaims, expiry: DateTime<Utc>, key: &Ristretto256SigningKey) -> String {
    let header = tari_jwt::jwt_compact::Header::empty().with_token_type("JWT");
    let signer = Ristretto256 {};
    let mut claims = Claims::<AccessClaims>::new(claims);
    claims.expiration = Some(expiry);
    signer.token(&header, &claims, key).expect("Failed to sign token")
}

pub fn issue_token(claims: AccessClaims, expiry: DateTime<Utc>) -> String {
    issue_token_with_key(claims, expiry, &signing_key())
}

pub fn claims_for(subject: &str) -> AccessClaims {
    AccessClaims { sub: subject.into(), iss: ISSUER.into(), aud: AUDIENCE.into() }
}

/// A token for `subject` that is valid for a day.
pub fn valid_token(subject: &str) -> String {
    issue_token(claims_for(subject), Utc::now() + Days::new(1))
}

/// A fresh database with three accounts: `alice` and `bob` are users, `root` is an admin.
pub async fn prepare_db() -> SqliteDatabase {
    let db = prepare_test_env(&random_db_path()).await;
    db.upsert_account("alice", "alice@example.com", Role::User).await.unwrap();
    db.upsert_account("bob", "bob@example.com", Role::User).await.unwrap();
    db.upsert_account("root", "root@example.com", Role::Admin).await.unwrap();
    db
}

pub async fn seed_order(db: &SqliteDatabase, number: &str, owner: &str) -> Order {
    let order = NewOrder::new(number.into(), owner.into(), Money::from_major(150_000), Money::from_major(12_000));
    db.insert_order(order).await.unwrap()
}

pub async fn seed_attempt(db: &SqliteDatabase, number: &str, reference: &str) {
    let attempt = NewPaymentAttempt::new(number.into(), reference.into(), PaymentMethod::Qris, "UNPAID".into());
    db.insert_payment_attempt(attempt).await.unwrap();
}

pub async fn status_of(db: &SqliteDatabase, number: &str) -> OrderStatus {
    db.fetch_order(&number.into()).await.unwrap().expect("order should exist").status
}

pub fn report(number: &str, reference: &str, status: ProviderStatus) -> TransactionStatus {
    TransactionStatus { reference: reference.into(), order_number: number.into(), status, paid_at: None }
}

pub async fn send(db: &SqliteDatabase, gateway: MockGateway, req: TestRequest) -> (StatusCode, String) {
    send_with_options(db, gateway, ServerOptions::default(), req).await
}

/// Runs one request against the full route table, backed by `db` and `gateway`.
pub async fn send_with_options(
    db: &SqliteDatabase,
    gateway: MockGateway,
    options: ServerOptions,
    req: TestRequest,
) -> (StatusCode, String) {
    let notifications = NotificationDispatcher::new(db.clone(), EventProducers::default());
    let api = ReconciliationApi::new(db.clone(), gateway, notifications.clone(), ReconciliationOptions::default());
    let resolver = IdentityResolver::new(db.clone(), &get_auth_config());
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(notifications))
        .app_data(web::Data::new(resolver))
        .app_data(web::Data::new(options))
        .configure(configure_routes::<SqliteDatabase, MockGateway>);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}
