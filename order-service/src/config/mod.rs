//! Configuration module for order-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// How long a webhook holds the per-reference processing lock.
    pub lock_ttl: Duration,
    /// Base URL encoded into QR payment payloads.
    pub qr_merchant_url: String,
}

impl OrderServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "order-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            redis: RedisConfig {
                url: Secret::new(
                    env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                ),
            },
            payment: PaymentConfig {
                lock_ttl: Duration::from_secs(
                    env::var("PAYMENT_LOCK_TTL_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(10),
                ),
                qr_merchant_url: env::var("QR_MERCHANT_URL")
                    .unwrap_or_else(|_| "https://pay.example.com/checkout".to_string()),
            },
        })
    }
}
