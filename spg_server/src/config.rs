use std::{env, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use spg_common::{helpers::parse_boolean_flag, Secret};
use spg_engine::ReconciliationOptions;
use tari_jwt::{
    tari_crypto::{ristretto::RistrettoPublicKey, tari_utilities::hex::Hex},
    Ristretto256VerifyingKey,
};

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8360;
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_POLL_MIN_AGE_SECS: i64 = 300;
const DEFAULT_PAYMENT_EXPIRY_HOURS: i64 = 24;
const DEFAULT_MAX_PAYMENT_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    /// The HMAC secret for provider callbacks. Falls back to the gateway private key.
    pub webhook_secret: Secret<String>,
    /// Callbacks that take longer than this are acknowledged anyway and finish in the background.
    pub webhook_timeout: Duration,
    /// `None` disables real-time push. Notifications are still stored.
    pub realtime: Option<RealtimeConfig>,
    pub poll_interval: Duration,
    pub poll_min_age: chrono::Duration,
    pub payment_expiry: chrono::Duration,
    pub max_payment_attempts: u32,
    /// If true, the poll worker is not started. Useful when several servers share one database.
    pub disable_poll: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            webhook_secret: Secret::default(),
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            realtime: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_min_age: chrono::Duration::seconds(DEFAULT_POLL_MIN_AGE_SECS),
            payment_expiry: chrono::Duration::hours(DEFAULT_PAYMENT_EXPIRY_HOURS),
            max_payment_attempts: DEFAULT_MAX_PAYMENT_ATTEMPTS,
            disable_poll: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_DATABASE_URL is not set. Please set it to the URL for the SPG database.");
            String::default()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let webhook_secret = match env::var("SPG_WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => Secret::new(s),
            _ => {
                info!("🪛️ SPG_WEBHOOK_SECRET is not set. Callbacks will be verified with the gateway private key.");
                gateway.private_key.clone()
            },
        };
        if webhook_secret.is_empty() {
            warn!("🚨️ No webhook secret is configured. Every payment callback will be rejected.");
        }
        let webhook_timeout =
            env_number::<u64>("SPG_WEBHOOK_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(DEFAULT_WEBHOOK_TIMEOUT);
        let poll_interval =
            env_number::<u64>("SPG_POLL_INTERVAL_SECS").map(Duration::from_secs).unwrap_or(DEFAULT_POLL_INTERVAL);
        let poll_min_age = chrono::Duration::seconds(
            env_number::<i64>("SPG_POLL_MIN_AGE_SECS").unwrap_or(DEFAULT_POLL_MIN_AGE_SECS),
        );
        let payment_expiry = chrono::Duration::hours(
            env_number::<i64>("SPG_PAYMENT_EXPIRY_HOURS").unwrap_or(DEFAULT_PAYMENT_EXPIRY_HOURS),
        );
        let max_payment_attempts =
            env_number::<u32>("SPG_MAX_PAYMENT_ATTEMPTS").unwrap_or(DEFAULT_MAX_PAYMENT_ATTEMPTS);
        let disable_poll = parse_boolean_flag(env::var("SPG_DISABLE_POLL").ok(), false);
        Self {
            host,
            port,
            database_url,
            auth: AuthConfig::from_env(),
            gateway,
            webhook_secret,
            webhook_timeout,
            realtime: RealtimeConfig::from_env(),
            poll_interval,
            poll_min_age,
            payment_expiry,
            max_payment_attempts,
            disable_poll,
        }
    }

    pub fn reconciliation_options(&self) -> ReconciliationOptions {
        let defaults = ReconciliationOptions::default();
        let query_timeout = if self.gateway.timeout.is_zero() { defaults.query_timeout } else { self.gateway.timeout };
        ReconciliationOptions {
            query_timeout,
            max_payment_attempts: self.max_payment_attempts,
            payment_expiry: self.payment_expiry,
            poll_min_age: self.poll_min_age,
            ..defaults
        }
    }
}

/// Reads and parses a numeric environment variable. Missing values are silent; invalid ones are logged and ignored.
fn env_number<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let s = env::var(name).ok()?;
    s.trim().parse::<T>().map_err(|e| warn!("🪛️ Invalid configuration value for {name} ({s}). {e}")).ok()
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// The `iss` claim every token must carry
    pub issuer: String,
    /// The `aud` claim every token must carry
    pub audience: String,
    /// The issuer's current public keys. If this is empty, signature verification is not possible and the server falls
    /// back to the degraded decode path.
    pub verification_keys: Vec<Ristretto256VerifyingKey>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let issuer = env::var("SPG_AUTH_ISSUER").unwrap_or_else(|_| {
            warn!("🪛️ SPG_AUTH_ISSUER is not set. No token will be accepted until it is.");
            String::default()
        });
        let audience = env::var("SPG_AUTH_AUDIENCE").unwrap_or_else(|_| {
            warn!("🪛️ SPG_AUTH_AUDIENCE is not set. No token will be accepted until it is.");
            String::default()
        });
        let verification_keys = env::var("SPG_AUTH_VERIFICATION_KEYS").map(|s| parse_key_set(&s)).unwrap_or_default();
        Self { issuer, audience, verification_keys }
    }
}

/// Parses a comma-separated list of hex public keys. Invalid entries are logged and skipped.
pub fn parse_key_set(s: &str) -> Vec<Ristretto256VerifyingKey> {
    s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .filter_map(|k| {
            RistrettoPublicKey::from_hex(k)
                .map_err(|e| warn!("🪛️ Ignoring invalid key ({k}) in SPG_AUTH_VERIFICATION_KEYS: {e}"))
                .ok()
        })
        .map(Ristretto256VerifyingKey)
        .collect()
}

//-------------------------------------------------  RealtimeConfig  ---------------------------------------------------
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    pub url: String,
    pub app_id: String,
    pub key: String,
    pub secret: Secret<String>,
}

impl RealtimeConfig {
    /// Returns `None` unless every value is set. Real-time push is optional, so this is never an error.
    pub fn from_env() -> Option<Self> {
        let url = env::var("SPG_REALTIME_URL").ok().filter(|s| !s.is_empty());
        let app_id = env::var("SPG_REALTIME_APP_ID").ok().filter(|s| !s.is_empty());
        let key = env::var("SPG_REALTIME_KEY").ok().filter(|s| !s.is_empty());
        let secret = env::var("SPG_REALTIME_SECRET").ok().filter(|s| !s.is_empty());
        match (url, app_id, key, secret) {
            (Some(url), Some(app_id), Some(key), Some(secret)) => {
                info!("🪛️ Real-time push is enabled via {url}");
                Some(Self { url, app_id, key, secret: Secret::new(secret) })
            },
            _ => {
                info!("🪛️ Real-time push is not fully configured. Notifications will be stored, but not pushed.");
                None
            },
        }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub webhook_timeout: Duration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { webhook_timeout: config.webhook_timeout }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT }
    }
}
