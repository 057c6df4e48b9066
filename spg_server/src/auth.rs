//! Bearer token authentication.
//!
//! Every request to `/api` carries an `Authorization: Bearer <token>` header. [`IdentityResolver`] turns that token
//! into an [`Identity`], or fails closed.
//!
//! The verification strategy is chosen once, at startup, from what is configured:
//! * [`VerificationStrategy::Primary`]: the token signature is checked against the issuer's key set.
//! * [`VerificationStrategy::DegradedDecode`]: no keys are configured, so signatures cannot be checked. The payload is
//!   decoded and the issuer, audience and expiry are checked before it is trusted. This is a degraded-security mode;
//!   it is logged loudly at startup and on every use.
//!
//! A token that the primary strategy rejects is rejected. The degraded path is never consulted when keys are
//! configured.
use std::sync::Arc;

use actix_web::{http::header::AUTHORIZATION, HttpRequest};
use chrono::{DateTime, TimeZone, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use spg_engine::{db_types::Identity, AccountDirectory};
use tari_jwt::{
    jwt_compact::{AlgorithmExt, TimeOptions, UntrustedToken},
    Ristretto256,
    Ristretto256VerifyingKey,
};

use crate::{config::AuthConfig, errors::AuthError};

/// The custom claims carried by an access token, next to the standard `exp`/`iat` claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
}

/// The token payload as read without verification.
#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    sub: String,
    iss: String,
    aud: String,
    exp: i64,
}

struct TrustedSubject {
    subject: String,
    expiry: DateTime<Utc>,
}

pub enum VerificationStrategy {
    Primary(Vec<Ristretto256VerifyingKey>),
    DegradedDecode,
}

impl VerificationStrategy {
    /// Selects the strategy from what the deployment can actually do.
    pub fn select(config: &AuthConfig) -> Self {
        if config.verification_keys.is_empty() {
            error!(
                "🚨️🚨️🚨️ No token verification keys are configured (SPG_AUTH_VERIFICATION_KEYS). Access tokens will be \
                 decoded WITHOUT signature verification. Only issuer, audience and expiry are checked. DO NOT operate \
                 in production like this. 🚨️🚨️🚨️"
            );
            VerificationStrategy::DegradedDecode
        } else {
            info!("🔐️ Access tokens will be verified against {} issuer key(s)", config.verification_keys.len());
            VerificationStrategy::Primary(config.verification_keys.clone())
        }
    }
}

#[derive(Clone)]
pub struct IdentityResolver<A> {
    directory: A,
    strategy: Arc<VerificationStrategy>,
    issuer: String,
    audience: String,
}

impl<A> IdentityResolver<A>
where A: AccountDirectory
{
    pub fn new(directory: A, config: &AuthConfig) -> Self {
        let strategy = Arc::new(VerificationStrategy::select(config));
        Self { directory, strategy, issuer: config.issuer.clone(), audience: config.audience.clone() }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.strategy.as_ref(), VerificationStrategy::DegradedDecode)
    }

    /// Resolves the caller behind the request's bearer token.
    pub async fn require_auth(&self, req: &HttpRequest) -> Result<Identity, AuthError> {
        let token = bearer_token(req)?;
        self.resolve(token).await
    }

    /// [`Self::require_auth`], plus the caller must be an admin.
    pub async fn require_admin(&self, req: &HttpRequest) -> Result<Identity, AuthError> {
        let identity = self.require_auth(req).await?;
        if identity.is_admin() {
            Ok(identity)
        } else {
            warn!("🔐️ {} tried to use an admin-only route", identity.subject_id);
            Err(AuthError::InsufficientPermissions("This action requires the admin role".into()))
        }
    }

    pub async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        check_token_shape(token)?;
        if self.issuer.is_empty() || self.audience.is_empty() {
            return Err(AuthError::ValidationError("The server has no trusted issuer configured".into()));
        }
        let trusted = match self.strategy.as_ref() {
            VerificationStrategy::Primary(keys) => self.verify_signed(token, keys)?,
            VerificationStrategy::DegradedDecode => self.decode_unverified(token)?,
        };
        let account = self
            .directory
            .fetch_account_by_subject(&trusted.subject)
            .await
            .map_err(|e| AuthError::DirectoryError(e.to_string()))?
            .ok_or_else(|| {
                debug!("🔐️ Token subject {} has no account", trusted.subject);
                AuthError::AccountNotFound
            })?;
        trace!("🔐️ Resolved {} as {}", account.subject_id, account.role);
        Ok(Identity {
            subject_id: account.subject_id,
            email: account.email,
            role: account.role,
            token_expiry: trusted.expiry,
        })
    }

    fn verify_signed(&self, token: &str, keys: &[Ristretto256VerifyingKey]) -> Result<TrustedSubject, AuthError> {
        let untrusted = UntrustedToken::new(token).map_err(|e| AuthError::PoorlyFormattedToken(format!("{e:?}")))?;
        let mut last_error = String::from("no keys");
        for key in keys {
            match Ristretto256.validator::<AccessClaims>(key).validate(&untrusted) {
                Ok(verified) => {
                    let claims = verified.claims();
                    claims
                        .validate_expiration(&TimeOptions::default())
                        .map_err(|e| AuthError::ValidationError(format!("{e}")))?;
                    self.check_issuer_and_audience(&claims.custom.iss, &claims.custom.aud)?;
                    let expiry = claims.expiration.ok_or_else(|| AuthError::ValidationError("No expiry".into()))?;
                    return Ok(TrustedSubject { subject: claims.custom.sub.clone(), expiry });
                },
                Err(e) => last_error = e.to_string(),
            }
        }
        debug!("🔐️ Token signature did not verify against any issuer key. {last_error}");
        Err(AuthError::ValidationError(last_error))
    }

    fn decode_unverified(&self, token: &str) -> Result<TrustedSubject, AuthError> {
        let payload = token.split('.').nth(1).unwrap_or_default().trim_end_matches('=');
        let bytes = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(format!("Payload is not base64. {e}")))?;
        let claims = serde_json::from_slice::<UnverifiedClaims>(&bytes)
            .map_err(|e| AuthError::PoorlyFormattedToken(format!("Payload is not a claim set. {e}")))?;
        self.check_issuer_and_audience(&claims.iss, &claims.aud)?;
        let expiry = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::ValidationError("Invalid expiry".into()))?;
        if expiry <= Utc::now() {
            return Err(AuthError::ValidationError("Token has expired".into()));
        }
        warn!("🔐️ Accepted a token for {} WITHOUT signature verification (degraded mode)", claims.sub);
        Ok(TrustedSubject { subject: claims.sub, expiry })
    }

    fn check_issuer_and_audience(&self, iss: &str, aud: &str) -> Result<(), AuthError> {
        if iss != self.issuer {
            debug!("🔐️ Token was issued by {iss}, which we do not trust");
            return Err(AuthError::ValidationError("Untrusted issuer".into()));
        }
        if aud != self.audience {
            debug!("🔐️ Token audience {aud} is not this application");
            return Err(AuthError::ValidationError("Wrong audience".into()));
        }
        Ok(())
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingCredential)?;
    let value = header.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredential);
    }
    Ok(token.trim())
}

/// A signed token has exactly three non-empty, dot-separated parts.
fn check_token_shape(token: &str) -> Result<(), AuthError> {
    let parts = token.split('.').collect::<Vec<_>>();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(AuthError::PoorlyFormattedToken("Expected a three-part signed token".into()));
    }
    Ok(())
}
