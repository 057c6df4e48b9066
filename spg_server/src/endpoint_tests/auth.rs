use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use spg_engine::db_types::Role;
use tari_jwt::{
    tari_crypto::{ristretto::RistrettoSecretKey, tari_utilities::hex::Hex},
    Ristretto256SigningKey,
};

use super::{
    helpers::*,
    mocks::MockGateway,
};
use crate::{
    auth::{AccessClaims, IdentityResolver},
    config::AuthConfig,
    errors::AuthError,
};

fn degraded_config() -> AuthConfig {
    AuthConfig { verification_keys: vec![], ..get_auth_config() }
}

/// A token whose payload is well-formed but whose signature is garbage.
fn unsigned_token(sub: &str, iss: &str, aud: &str, exp: i64) -> String {
    let payload = serde_json::json!({ "sub": sub, "iss": iss, "aud": aud, "exp": exp }).to_string();
    let header = base64::encode_config(r#"{"alg":"RistrettoSchnorr","typ":"JWT"}"#, base64::URL_SAFE_NO_PAD);
    let payload = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
    format!("{header}.{payload}.bm90LWEtc2lnbmF0dXJl")
}

#[actix_web::test]
async fn valid_token_resolves_to_the_account() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    assert!(!resolver.is_degraded());
    let identity = resolver.resolve(&valid_token("root")).await.expect("token should be accepted");
    assert_eq!(identity.subject_id, "root");
    assert_eq!(identity.email, "root@example.com");
    assert_eq!(identity.role, Role::Admin);
    assert!(identity.token_expiry > Utc::now());
}

#[actix_web::test]
async fn malformed_tokens_are_rejected() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    for token in ["", "abc", "abc.def", "a..c", "abc.def.ghi.jkl"] {
        let err = resolver.resolve(token).await.expect_err("malformed token accepted");
        assert!(matches!(err, AuthError::PoorlyFormattedToken(_)), "{token}: {err}");
        assert!(err.is_unauthenticated());
    }
}

#[actix_web::test]
async fn token_signed_by_another_key_is_rejected() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    let other_key = Ristretto256SigningKey(
        RistrettoSecretKey::from_hex("0100000000000000000000000000000000000000000000000000000000000000").unwrap(),
    );
    let token = issue_token_with_key(claims_for("alice"), Utc::now() + Duration::hours(1), &other_key);
    let err = resolver.resolve(&token).await.expect_err("forged token accepted");
    assert!(matches!(err, AuthError::ValidationError(_)));
}

#[actix_web::test]
async fn expired_token_is_rejected() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    let token = issue_token(claims_for("alice"), Utc::now() - Duration::hours(1));
    let err = resolver.resolve(&token).await.expect_err("expired token accepted");
    assert!(matches!(err, AuthError::ValidationError(_)));
}

#[actix_web::test]
async fn wrong_issuer_or_audience_is_rejected() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    let expiry = Utc::now() + Duration::hours(1);
    let claims = AccessClaims { iss: "https://evil.example.com".into(), ..claims_for("alice") };
    let err = resolver.resolve(&issue_token(claims, expiry)).await.expect_err("foreign issuer accepted");
    assert!(matches!(err, AuthError::ValidationError(_)));
    let claims = AccessClaims { aud: "another-app".into(), ..claims_for("alice") };
    let err = resolver.resolve(&issue_token(claims, expiry)).await.expect_err("foreign audience accepted");
    assert!(matches!(err, AuthError::ValidationError(_)));
}

#[actix_web::test]
async fn unknown_subject_is_rejected() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    let err = resolver.resolve(&valid_token("mallory")).await.expect_err("unknown account accepted");
    assert!(matches!(err, AuthError::AccountNotFound));
}

#[actix_web::test]
async fn unsigned_token_never_passes_when_keys_are_configured() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &get_auth_config());
    let exp = (Utc::now() + Duration::hours(1)).timestamp();
    let err = resolver.resolve(&unsigned_token("alice", ISSUER, AUDIENCE, exp)).await.expect_err("unsigned accepted");
    assert!(err.is_unauthenticated());
}

#[actix_web::test]
async fn degraded_mode_checks_claims() {
    let db = prepare_db().await;
    let resolver = IdentityResolver::new(db, &degraded_config());
    assert!(resolver.is_degraded());
    let exp = (Utc::now() + Duration::hours(1)).timestamp();

    let identity = resolver.resolve(&unsigned_token("alice", ISSUER, AUDIENCE, exp)).await.expect("claims are valid");
    assert_eq!(identity.subject_id, "alice");
    assert_eq!(identity.token_expiry.timestamp(), exp);
    // A properly signed token decodes too
    let identity = resolver.resolve(&valid_token("bob")).await.expect("signed token");
    assert_eq!(identity.subject_id, "bob");

    let bad = [
        unsigned_token("alice", "https://evil.example.com", AUDIENCE, exp),
        unsigned_token("alice", ISSUER, "another-app", exp),
        unsigned_token("alice", ISSUER, AUDIENCE, (Utc::now() - Duration::minutes(1)).timestamp()),
        format!("{}.!!!.sig", "eyJhbGciOiJub25lIn0"),
    ];
    for token in bad {
        let err = resolver.resolve(&token).await.expect_err("bad claims accepted");
        assert!(err.is_unauthenticated(), "{token}: {err}");
    }
}

#[actix_web::test]
async fn no_trusted_issuer_means_no_access() {
    let db = prepare_db().await;
    let config = AuthConfig { issuer: String::default(), ..get_auth_config() };
    let resolver = IdentityResolver::new(db, &config);
    let err = resolver.resolve(&valid_token("alice")).await.expect_err("token accepted without an issuer");
    assert!(matches!(err, AuthError::ValidationError(_)));
}

#[actix_web::test]
async fn api_routes_require_a_bearer_token() {
    let db = prepare_db().await;
    seed_order(&db, "INV-1", "alice").await;
    let (status, body) = send(&db, MockGateway::new(), TestRequest::get().uri("/api/orders/INV-1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No access token was provided"), "{body}");

    let req = TestRequest::get().uri("/api/orders/INV-1").insert_header(("Authorization", "Basic YWxpY2U6cGFzcw=="));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get().uri("/api/orders/INV-1").insert_header(bearer("not-a-token"));
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("not in the correct format"), "{body}");
}

#[actix_web::test]
async fn health_needs_no_token() {
    let db = prepare_db().await;
    let (status, body) = send(&db, MockGateway::new(), TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}
