// settlement/src/services/gateway.rs

//! Payment gateway boundary: transaction initialization and server-side verification.
//!
//! `HttpGatewayClient` speaks the Paystack-style REST API (bearer secret key,
//! `{ status, message, data }` envelopes, amounts in minor units). Tests and local
//! runs use `MockGateway` from `gateway_mock`.

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("gateway request failed: {0}")]
  Transport(String),

  #[error("gateway did not answer within {0:?}")]
  Timeout(Duration),

  #[error("gateway returned {status}: {message}")]
  Upstream { status: u16, message: String },

  #[error("gateway has no transaction with reference {reference}")]
  NotFound { reference: String },

  #[error("gateway rejected the request: {0}")]
  Rejected(String),

  #[error("unreadable gateway response: {0}")]
  Decode(String),

  #[error("amount must be a positive number of minor units, got {0}")]
  InvalidAmount(i64),
}

impl GatewayError {
  /// Network failures, timeouts and 5xx answers may succeed on a later attempt.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      GatewayError::Transport(_) | GatewayError::Timeout(_) | GatewayError::Upstream { .. }
    )
  }
}

/// Gateway-reported state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
  Success,
  Failed,
  Abandoned,
  /// Still in flight at the gateway. Never a reason to cancel the order.
  Pending,
}

impl GatewayStatus {
  pub fn from_gateway(raw: &str) -> Self {
    match raw.to_ascii_lowercase().as_str() {
      "success" => GatewayStatus::Success,
      "failed" | "reversed" => GatewayStatus::Failed,
      "abandoned" => GatewayStatus::Abandoned,
      _ => GatewayStatus::Pending,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      GatewayStatus::Success => "success",
      GatewayStatus::Failed => "failed",
      GatewayStatus::Abandoned => "abandoned",
      GatewayStatus::Pending => "pending",
    }
  }

  /// Failed or abandoned: the buyer will not pay against this reference.
  pub fn is_terminal_failure(self) -> bool {
    matches!(self, GatewayStatus::Failed | GatewayStatus::Abandoned)
  }
}

impl std::fmt::Display for GatewayStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone)]
pub struct InitializeRequest {
  pub email: String,
  pub amount_minor: i64,
  /// Generated by the client when absent.
  pub reference: Option<String>,
  pub currency: String,
  pub callback_url: Option<String>,
  pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
  pub authorization_url: String,
  pub access_code: String,
  pub reference: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
  pub reference: String,
  pub status: GatewayStatus,
  pub amount_minor: i64,
  pub currency: String,
  pub customer_email: Option<String>,
  /// Whatever was attached at initialization. `Value::Null` when absent.
  pub metadata: Value,
}

impl VerifiedTransaction {
  /// Reads a string field from the metadata object.
  pub fn metadata_str(&self, key: &str) -> Option<&str> {
    self.metadata.get(key).and_then(Value::as_str)
  }
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
  async fn initialize_transaction(&self, request: &InitializeRequest) -> Result<InitializedTransaction, GatewayError>;

  async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;
}

/// `PAY-<unix millis>-<12 random alphanumerics>`.
pub fn generate_reference() -> String {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(12)
    .map(char::from)
    .collect();
  format!("PAY-{}-{}", Utc::now().timestamp_millis(), suffix)
}

pub const MAX_REFERENCE_LEN: usize = 100;

/// References travel in gateway URL paths: at most 100 characters of
/// `[A-Za-z0-9_.-]`, starting with a letter or digit.
pub fn is_valid_reference(reference: &str) -> bool {
  reference.len() <= MAX_REFERENCE_LEN
    && reference.as_bytes().first().is_some_and(u8::is_ascii_alphanumeric)
    && reference
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  status: bool,
  #[serde(default)]
  message: String,
  data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
  email: &'a str,
  amount: i64,
  reference: &'a str,
  currency: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  callback_url: Option<&'a str>,
  metadata: &'a Value,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
  reference: String,
  status: String,
  amount: i64,
  currency: String,
  #[serde(default)]
  customer: Option<VerifyCustomer>,
  #[serde(default)]
  metadata: Value,
}

#[derive(Debug, Deserialize)]
struct VerifyCustomer {
  email: Option<String>,
}

pub struct HttpGatewayClient {
  http: Client,
  base_url: Url,
  secret_key: String,
  timeout: Duration,
}

impl HttpGatewayClient {
  pub fn new(base_url: &str, secret_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
    let http = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {}", e)))?;
    let base_url = Url::parse(base_url)
      .map_err(|e| GatewayError::Transport(format!("invalid gateway base URL {}: {}", base_url, e)))?;
    if base_url.cannot_be_a_base() {
      return Err(GatewayError::Transport(format!("gateway base URL {} cannot carry a path", base_url)));
    }
    Ok(Self {
      http,
      base_url,
      secret_key: secret_key.to_string(),
      timeout,
    })
  }

  /// Appends `segments` to the base URL, percent-encoding each one.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn map_send_error(&self, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
      GatewayError::Timeout(self.timeout)
    } else {
      GatewayError::Transport(err.to_string())
    }
  }

  async fn read_envelope<T: DeserializeOwned>(
    &self,
    response: reqwest::Response,
    reference: &str,
  ) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| self.map_send_error(e))?;

    if status == StatusCode::NOT_FOUND {
      return Err(GatewayError::NotFound {
        reference: reference.to_string(),
      });
    }
    if status.is_server_error() {
      return Err(GatewayError::Upstream {
        status: status.as_u16(),
        message: body,
      });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if !status.is_success() || !envelope.status {
      warn!(http_status = %status, message = %envelope.message, "Gateway rejected request.");
      return Err(GatewayError::Rejected(envelope.message));
    }
    envelope
      .data
      .ok_or_else(|| GatewayError::Decode("response envelope has no data".to_string()))
  }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
  #[instrument(name = "gateway::initialize", skip(self, request), fields(amount_minor = request.amount_minor))]
  async fn initialize_transaction(&self, request: &InitializeRequest) -> Result<InitializedTransaction, GatewayError> {
    if request.amount_minor <= 0 {
      return Err(GatewayError::InvalidAmount(request.amount_minor));
    }
    let reference = request.reference.clone().unwrap_or_else(generate_reference);
    let body = InitializeBody {
      email: &request.email,
      amount: request.amount_minor,
      reference: &reference,
      currency: &request.currency,
      callback_url: request.callback_url.as_deref(),
      metadata: &request.metadata,
    };

    let response = self
      .http
      .post(self.endpoint(&["transaction", "initialize"]))
      .bearer_auth(&self.secret_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| self.map_send_error(e))?;

    let initialized: InitializedTransaction = self.read_envelope(response, &reference).await?;
    debug!(reference = %initialized.reference, "Gateway transaction initialized.");
    Ok(initialized)
  }

  #[instrument(name = "gateway::verify", skip(self))]
  async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
    let response = self
      .http
      .get(self.endpoint(&["transaction", "verify", reference]))
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(|e| self.map_send_error(e))?;

    let data: VerifyData = self.read_envelope(response, reference).await?;
    let metadata = match data.metadata {
      // Paystack sends "" when nothing was attached.
      Value::String(s) if s.is_empty() => Value::Null,
      other => other,
    };
    Ok(VerifiedTransaction {
      reference: data.reference,
      status: GatewayStatus::from_gateway(&data.status),
      amount_minor: data.amount,
      currency: data.currency,
      customer_email: data.customer.and_then(|c| c.email),
      metadata,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gateway_statuses_map_conservatively() {
    assert_eq!(GatewayStatus::from_gateway("success"), GatewayStatus::Success);
    assert_eq!(GatewayStatus::from_gateway("abandoned"), GatewayStatus::Abandoned);
    assert_eq!(GatewayStatus::from_gateway("reversed"), GatewayStatus::Failed);
    assert_eq!(GatewayStatus::from_gateway("ongoing"), GatewayStatus::Pending);
    assert_eq!(GatewayStatus::from_gateway("something-new"), GatewayStatus::Pending);
    assert!(!GatewayStatus::Pending.is_terminal_failure());
  }

  #[test]
  fn reference_validation_keeps_urls_intact() {
    assert!(is_valid_reference(&generate_reference()));
    assert!(is_valid_reference("T123_abc.v2"));
    assert!(!is_valid_reference(""));
    assert!(!is_valid_reference("x/../../customer"));
    assert!(!is_valid_reference("PAY-1?status=success"));
    assert!(!is_valid_reference("PAY-1#frag"));
    assert!(!is_valid_reference(".."));
    assert!(!is_valid_reference(&"a".repeat(MAX_REFERENCE_LEN + 1)));
  }

  #[test]
  fn endpoint_segments_are_percent_encoded() {
    let client = HttpGatewayClient::new("https://api.example.com/", "sk_test", Duration::from_secs(1)).unwrap();
    assert_eq!(
      client.endpoint(&["transaction", "verify", "PAY-1"]).as_str(),
      "https://api.example.com/transaction/verify/PAY-1"
    );
    assert_eq!(
      client.endpoint(&["transaction", "verify", "x/y?z#w"]).as_str(),
      "https://api.example.com/transaction/verify/x%2Fy%3Fz%23w"
    );

    let nested = HttpGatewayClient::new("http://localhost:9000/v1", "sk_test", Duration::from_secs(1)).unwrap();
    assert_eq!(
      nested.endpoint(&["transaction", "initialize"]).as_str(),
      "http://localhost:9000/v1/transaction/initialize"
    );
  }

  #[test]
  fn references_have_expected_shape() {
    let reference = generate_reference();
    let parts: Vec<&str> = reference.splitn(3, '-').collect();
    assert_eq!(parts[0], "PAY");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 12);
    assert_ne!(reference, generate_reference());
  }

  #[test]
  fn only_network_class_errors_are_transient() {
    assert!(GatewayError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(GatewayError::Upstream { status: 502, message: String::new() }.is_transient());
    assert!(!GatewayError::NotFound { reference: "x".into() }.is_transient());
    assert!(!GatewayError::Rejected("bad key".into()).is_transient());
  }
}
