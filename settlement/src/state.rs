// settlement/src/state.rs

use std::sync::Arc;

use stepflow::Flows;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines;
use crate::services::gateway::GatewayClient;
use crate::services::notifier::Notifier;
use crate::services::retry::RetryPolicy;
use crate::store::{CartStore, LedgerStore, NotificationSink, OrderStore};

/// The collaborators a running service is wired to.
pub struct Backends {
  pub orders: Arc<dyn OrderStore>,
  pub ledger: Arc<dyn LedgerStore>,
  pub carts: Arc<dyn CartStore>,
  pub notifications: Arc<dyn NotificationSink>,
  pub gateway: Arc<dyn GatewayClient>,
}

#[derive(Clone)]
pub struct AppState {
  pub orders: Arc<dyn OrderStore>,
  pub ledger: Arc<dyn LedgerStore>,
  pub carts: Arc<dyn CartStore>,
  pub gateway: Arc<dyn GatewayClient>,
  pub notifier: Notifier,
  pub flows: Arc<Flows<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires `backends` together and registers every pipeline.
  pub fn new(config: Arc<AppConfig>, backends: Backends) -> Self {
    let state = Self {
      orders: backends.orders,
      ledger: backends.ledger,
      carts: backends.carts,
      gateway: backends.gateway,
      notifier: Notifier::new(backends.notifications),
      flows: Arc::new(Flows::new()),
      config,
    };
    pipelines::register_all_pipelines(&state.flows, &state);
    state
  }

  pub fn verify_retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.config.verify_max_retries, self.config.verify_retry_base)
  }
}
