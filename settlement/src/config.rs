// settlement/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
  /// Real HTTP calls against `gateway_base_url`.
  Http,
  /// In-process gateway that approves every initialized transaction.
  Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  /// `None` runs against the in-memory store.
  pub database_url: Option<String>,
  pub database_max_connections: u32,

  pub gateway_mode: GatewayMode,
  pub gateway_base_url: String,
  pub gateway_secret_key: String,
  pub gateway_timeout: Duration,
  pub webhook_secret: String,
  pub currency_code: String,
  pub callback_url: Option<String>,

  pub verify_max_retries: u32,
  pub verify_retry_base: Duration,

  /// Zero disables the reconciliation sweep.
  pub reconcile_interval: Duration,
  pub reconcile_stale_after: Duration,

  pub log_format: LogFormat,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
      .field("database_max_connections", &self.database_max_connections)
      .field("gateway_mode", &self.gateway_mode)
      .field("gateway_base_url", &self.gateway_base_url)
      .field("gateway_timeout", &self.gateway_timeout)
      .field("currency_code", &self.currency_code)
      .field("callback_url", &self.callback_url)
      .field("verify_max_retries", &self.verify_max_retries)
      .field("verify_retry_base", &self.verify_retry_base)
      .field("reconcile_interval", &self.reconcile_interval)
      .field("reconcile_stale_after", &self.reconcile_stale_after)
      .field("log_format", &self.log_format)
      .finish_non_exhaustive()
  }
}

impl Default for AppConfig {
  /// Local development settings: memory store, mock gateway.
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      database_url: None,
      database_max_connections: 10,
      gateway_mode: GatewayMode::Mock,
      gateway_base_url: "https://api.paystack.co".to_string(),
      gateway_secret_key: "sk_test_local".to_string(),
      gateway_timeout: Duration::from_millis(10_000),
      webhook_secret: "sk_test_local".to_string(),
      currency_code: "NGN".to_string(),
      callback_url: None,
      verify_max_retries: 2,
      verify_retry_base: Duration::from_millis(200),
      reconcile_interval: Duration::from_secs(0),
      reconcile_stale_after: Duration::from_secs(15 * 60),
      log_format: LogFormat::Pretty,
    }
  }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(name) {
    Ok(raw) if !raw.trim().is_empty() => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    _ => Ok(default),
  }
}

fn optional_var(name: &str) -> Option<String> {
  env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    let defaults = AppConfig::default();

    let gateway_mode = match optional_var("GATEWAY_MODE").as_deref().map(str::to_ascii_lowercase).as_deref() {
      None | Some("http") => GatewayMode::Http,
      Some("mock") => GatewayMode::Mock,
      Some(other) => return Err(AppError::Config(format!("Invalid GATEWAY_MODE: {}", other))),
    };

    let gateway_secret_key = match (gateway_mode, optional_var("GATEWAY_SECRET_KEY")) {
      (_, Some(key)) => key,
      (GatewayMode::Mock, None) => defaults.gateway_secret_key.clone(),
      (GatewayMode::Http, None) => {
        return Err(AppError::Config("Missing environment variable 'GATEWAY_SECRET_KEY'".to_string()))
      }
    };
    // The gateway signs webhooks with the secret key unless told otherwise.
    let webhook_secret = optional_var("WEBHOOK_SECRET").unwrap_or_else(|| gateway_secret_key.clone());

    let log_format = match optional_var("LOG_FORMAT").as_deref() {
      Some("json") => LogFormat::Json,
      _ => LogFormat::Pretty,
    };

    let config = Self {
      server_host: optional_var("SERVER_HOST").unwrap_or(defaults.server_host),
      server_port: parse_var("SERVER_PORT", defaults.server_port)?,
      database_url: optional_var("DATABASE_URL"),
      database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
      gateway_mode,
      gateway_base_url: optional_var("GATEWAY_BASE_URL")
        .map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or(defaults.gateway_base_url),
      gateway_secret_key,
      gateway_timeout: Duration::from_millis(parse_var("GATEWAY_TIMEOUT_MS", 10_000u64)?),
      webhook_secret,
      currency_code: optional_var("CURRENCY_CODE")
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or(defaults.currency_code),
      callback_url: optional_var("CALLBACK_URL"),
      verify_max_retries: parse_var("VERIFY_MAX_RETRIES", defaults.verify_max_retries)?,
      verify_retry_base: Duration::from_millis(parse_var("VERIFY_RETRY_BASE_MS", 200u64)?),
      reconcile_interval: Duration::from_secs(parse_var("RECONCILE_INTERVAL_SECS", 0u64)?),
      reconcile_stale_after: Duration::from_secs(parse_var("RECONCILE_STALE_AFTER_SECS", 900u64)?),
      log_format,
    };

    tracing::info!(config = ?config, "Application configuration loaded.");
    Ok(config)
  }
}
