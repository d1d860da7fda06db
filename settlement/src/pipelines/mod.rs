// settlement/src/pipelines/mod.rs

//! Pipelines of the settlement service and their registration.

use std::sync::Arc;

use stepflow::Flows;

use crate::errors::AppError;
use crate::state::AppState;

pub mod common_steps;
pub mod contexts;

pub mod checkout_pipeline;
pub mod reconciliation;
pub mod settlement_pipeline;
pub mod webhook_pipeline;

pub use checkout_pipeline::start_checkout;
pub use settlement_pipeline::{settle_payment, settle_payment_with_retry};
pub use webhook_pipeline::process_webhook;

/// Registers every pipeline with `flows`. Called once from `AppState::new`.
pub fn register_all_pipelines(flows: &Arc<Flows<AppError>>, app_state: &AppState) {
  tracing::info!("Registering pipelines...");

  settlement_pipeline::register_settlement_pipeline(flows, app_state);
  checkout_pipeline::register_checkout_pipeline(flows, app_state);
  webhook_pipeline::register_webhook_pipeline(flows, app_state);

  tracing::info!("All pipelines registered.");
}
