use std::env;

use campus_eats_engine::order_objects::{CommissionRate, DEFAULT_COMMISSION_RATE};
use ce_common::Secret;
use log::*;

const DEFAULT_CE_HOST: &str = "127.0.0.1";
const DEFAULT_CE_PORT: u16 = 8360;
const DEFAULT_CHAPA_API_URL: &str = "https://api.chapa.co/v1";
const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The platform's cut of each order, frozen into orders at placement time.
    pub commission_rate: CommissionRate,
    /// HS256 secret for access tokens. The auth service that issues tokens shares this secret.
    pub jwt_secret: Secret<String>,
    pub chapa: ChapaConfig,
    pub fcm: FcmConfig,
}

#[derive(Clone, Debug, Default)]
pub struct ChapaConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// Secret used to check the `Chapa-Signature` header on inbound webhooks. Leave empty to
    /// accept unsigned webhooks (dev only).
    pub webhook_secret: Secret<String>,
    pub callback_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FcmConfig {
    pub endpoint: String,
    /// Empty key disables push delivery; sends become logged no-ops.
    pub server_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CE_HOST.to_string(),
            port: DEFAULT_CE_PORT,
            database_url: String::default(),
            commission_rate: CommissionRate::default(),
            jwt_secret: Secret::default(),
            chapa: ChapaConfig { api_url: DEFAULT_CHAPA_API_URL.to_string(), ..Default::default() },
            fcm: FcmConfig { endpoint: DEFAULT_FCM_ENDPOINT.to_string(), ..Default::default() },
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CE_HOST").ok().unwrap_or_else(|| DEFAULT_CE_HOST.into());
        let port = env::var("CE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for CE_PORT. {e} Using the default, {DEFAULT_CE_PORT}, instead.");
                    DEFAULT_CE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CE_PORT);
        let database_url = env::var("CE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CE_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let commission_rate = commission_rate_from(env::var("CE_COMMISSION_RATE").ok());
        let jwt_secret = env::var("CE_JWT_SECRET").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ CE_JWT_SECRET is not set. Tokens will not verify against a real auth service.");
            Secret::default()
        });
        let chapa = ChapaConfig {
            api_url: env::var("CE_CHAPA_API_URL").ok().unwrap_or_else(|| DEFAULT_CHAPA_API_URL.into()),
            secret_key: env::var("CE_CHAPA_SECRET_KEY").map(Secret::new).unwrap_or_default(),
            webhook_secret: env::var("CE_CHAPA_WEBHOOK_SECRET").map(Secret::new).unwrap_or_else(|_| {
                warn!("🪛️ CE_CHAPA_WEBHOOK_SECRET is not set. Webhook signatures will not be checked.");
                Secret::default()
            }),
            callback_url: env::var("CE_CHAPA_CALLBACK_URL").ok(),
        };
        let fcm = FcmConfig {
            endpoint: env::var("CE_FCM_ENDPOINT").ok().unwrap_or_else(|| DEFAULT_FCM_ENDPOINT.into()),
            server_key: env::var("CE_FCM_SERVER_KEY").map(Secret::new).unwrap_or_default(),
        };
        Self { host, port, database_url, commission_rate, jwt_secret, chapa, fcm }
    }
}

/// Parses the commission rate from the environment value, falling back to the default on
/// anything that is not a fraction in [0, 1].
fn commission_rate_from(value: Option<String>) -> CommissionRate {
    let Some(raw) = value else {
        return CommissionRate::default();
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|rate| CommissionRate::new(rate).ok())
        .unwrap_or_else(|| {
            error!(
                "🪛️ '{raw}' is not a valid CE_COMMISSION_RATE. Using the default, {DEFAULT_COMMISSION_RATE}, instead."
            );
            CommissionRate::default()
        })
}
