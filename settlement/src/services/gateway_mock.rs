// settlement/src/services/gateway_mock.rs

//! In-process gateway with scripted outcomes.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, instrument};

use super::gateway::{
  generate_reference, GatewayClient, GatewayError, GatewayStatus, InitializeRequest, InitializedTransaction,
  VerifiedTransaction,
};

#[derive(Debug, Clone)]
struct MockTransaction {
  email: String,
  amount_minor: i64,
  currency: String,
  metadata: Value,
  status: GatewayStatus,
}

#[derive(Default)]
struct MockState {
  transactions: HashMap<String, MockTransaction>,
  /// Remaining transient failures to inject per reference.
  transient_failures: HashMap<String, u32>,
  initialize_failures: u32,
}

pub struct MockGateway {
  state: Mutex<MockState>,
  /// Status given to freshly initialized transactions.
  initial_status: GatewayStatus,
  latency: Duration,
  verify_calls: AtomicUsize,
  initialize_calls: AtomicUsize,
}

impl MockGateway {
  /// Initialized transactions stay `Pending` until scripted otherwise.
  pub fn new() -> Self {
    Self::with_initial_status(GatewayStatus::Pending)
  }

  /// Every initialized transaction is immediately paid. Used by `GATEWAY_MODE=mock`.
  pub fn auto_approving() -> Self {
    Self::with_initial_status(GatewayStatus::Success)
  }

  fn with_initial_status(initial_status: GatewayStatus) -> Self {
    Self {
      state: Mutex::new(MockState::default()),
      initial_status,
      latency: Duration::ZERO,
      verify_calls: AtomicUsize::new(0),
      initialize_calls: AtomicUsize::new(0),
    }
  }

  /// Delay applied to every call, to widen race windows in concurrency tests.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  /// Registers a transaction as if the buyer had already gone through the payment page.
  pub fn register_transaction(&self, reference: &str, amount_minor: i64, status: GatewayStatus, metadata: Value) {
    self.state.lock().transactions.insert(
      reference.to_string(),
      MockTransaction {
        email: "buyer@example.com".to_string(),
        amount_minor,
        currency: "NGN".to_string(),
        metadata,
        status,
      },
    );
  }

  pub fn set_status(&self, reference: &str, status: GatewayStatus) {
    if let Some(txn) = self.state.lock().transactions.get_mut(reference) {
      txn.status = status;
    }
  }

  /// The next `count` verifications of `reference` fail with a timeout.
  pub fn fail_next_verifications(&self, reference: &str, count: u32) {
    self.state.lock().transient_failures.insert(reference.to_string(), count);
  }

  /// The next `count` initializations fail with a transport error.
  pub fn fail_next_initializations(&self, count: u32) {
    self.state.lock().initialize_failures = count;
  }

  pub fn verify_calls(&self) -> usize {
    self.verify_calls.load(Ordering::SeqCst)
  }

  pub fn initialize_calls(&self) -> usize {
    self.initialize_calls.load(Ordering::SeqCst)
  }

  /// Metadata attached when `reference` was initialized.
  pub fn metadata_for(&self, reference: &str) -> Option<Value> {
    self.state.lock().transactions.get(reference).map(|t| t.metadata.clone())
  }

  pub fn amount_for(&self, reference: &str) -> Option<i64> {
    self.state.lock().transactions.get(reference).map(|t| t.amount_minor)
  }

  async fn simulate_latency(&self) {
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
  }
}

impl Default for MockGateway {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl GatewayClient for MockGateway {
  #[instrument(name = "mock_gateway::initialize", skip(self, request))]
  async fn initialize_transaction(&self, request: &InitializeRequest) -> Result<InitializedTransaction, GatewayError> {
    self.initialize_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_latency().await;
    if request.amount_minor <= 0 {
      return Err(GatewayError::InvalidAmount(request.amount_minor));
    }

    let reference = request.reference.clone().unwrap_or_else(generate_reference);
    let mut state = self.state.lock();
    if state.initialize_failures > 0 {
      state.initialize_failures -= 1;
      return Err(GatewayError::Transport("simulated connection reset".to_string()));
    }
    state.transactions.insert(
      reference.clone(),
      MockTransaction {
        email: request.email.clone(),
        amount_minor: request.amount_minor,
        currency: request.currency.clone(),
        metadata: request.metadata.clone(),
        status: self.initial_status,
      },
    );
    info!(%reference, amount_minor = request.amount_minor, "Mock transaction initialized.");

    Ok(InitializedTransaction {
      authorization_url: format!("https://checkout.mock.local/{}", reference),
      access_code: format!("ac_{}", &reference[reference.len().saturating_sub(8)..]),
      reference,
    })
  }

  #[instrument(name = "mock_gateway::verify", skip(self))]
  async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
    self.verify_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_latency().await;

    let mut state = self.state.lock();
    if let Some(remaining) = state.transient_failures.get_mut(reference) {
      if *remaining > 0 {
        *remaining -= 1;
        return Err(GatewayError::Timeout(Duration::from_millis(10)));
      }
    }
    let txn = state
      .transactions
      .get(reference)
      .cloned()
      .ok_or_else(|| GatewayError::NotFound {
        reference: reference.to_string(),
      })?;

    Ok(VerifiedTransaction {
      reference: reference.to_string(),
      status: txn.status,
      amount_minor: txn.amount_minor,
      currency: txn.currency,
      customer_email: Some(txn.email),
      metadata: txn.metadata,
    })
  }
}
