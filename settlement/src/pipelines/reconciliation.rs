// settlement/src/pipelines/reconciliation.rs

//! Periodic sweep over stale pending orders.
//!
//! Buyers who close the tab before the callback and webhooks that never arrive
//! leave orders pending although the gateway knows their outcome. The sweep asks
//! the gateway through the regular settlement pipeline, so it is as idempotent as
//! any other trigger.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::{SettlementOutcome, SettlementTrigger};
use crate::pipelines::settlement_pipeline::settle_payment;
use crate::state::AppState;

const SWEEP_BATCH_SIZE: i64 = 100;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
  pub examined: usize,
  pub settled: usize,
  pub already_processed: usize,
  pub not_paid: usize,
  pub failed: usize,
}

pub async fn sweep_stale_orders(app_state: &AppState) -> AppResult<SweepReport> {
  let stale_after = chrono::Duration::from_std(app_state.config.reconcile_stale_after)
    .map_err(|e| AppError::Config(format!("invalid reconciliation window: {}", e)))?;
  let cutoff = Utc::now() - stale_after;
  let stale = app_state.orders.stale_pending_orders(cutoff, SWEEP_BATCH_SIZE).await?;

  let mut report = SweepReport::default();
  for order in stale {
    let Some(reference) = order.payment_reference.as_deref() else {
      continue;
    };
    report.examined += 1;
    match settle_payment(app_state, reference, SettlementTrigger::Reconciliation).await {
      Ok(SettlementOutcome::Settled(_)) => report.settled += 1,
      Ok(SettlementOutcome::AlreadyProcessed(_)) => report.already_processed += 1,
      Ok(SettlementOutcome::NotPaid(_)) => report.not_paid += 1,
      Err(e) => {
        warn!(order_id = %order.id, %reference, error = %e, "Reconciliation of order failed.");
        report.failed += 1;
      }
    }
  }

  if report.examined > 0 {
    info!(?report, "Reconciliation sweep finished.");
  } else {
    debug!("Reconciliation sweep found nothing to do.");
  }
  Ok(report)
}

/// Runs `sweep_stale_orders` every `interval` until the task is aborted.
pub fn spawn_reconciliation(app_state: AppState, interval: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      if let Err(e) = sweep_stale_orders(&app_state).await {
        warn!(error = %e, "Reconciliation sweep failed.");
      }
    }
  })
}
