// settlement/src/pipelines/settlement_pipeline.rs

//! Payment settlement: turns a gateway-confirmed payment into a confirmed order,
//! creator wallet credits, a completed cart and notifications. Exactly once per
//! order, however many callbacks, webhooks and sweeps race for it.
//!
//! Steps:
//!  1. `verify_transaction`: ask the gateway (never trust the caller).
//!  2. `handle_unpaid`: skipped on success. Cancels still-pending orders the
//!     gateway reports failed or abandoned, then stops with `NotPaid`.
//!  3. `load_order`: the reference must belong to an order.
//!  4. `restore_missing_credits`: only for settled orders. Appends creator credits
//!     a settled order lacks; writes nothing when the ledger is complete.
//!  5. `short_circuit_settled`: `AlreadyProcessed` exit.
//!  6. `settle_and_credit`: conditional status flip plus one credit per creator, in
//!     one store transaction. Only the winner continues.
//!  7. `complete_cart`: optional, skipped without cart correlation.
//!  8. `notify_parties`: best effort, never affects the outcome.
//!  9. `build_receipt`.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use stepflow::{ContextData, Flows, Pipeline, PipelineControl, SkipCondition, StepKind};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::money::to_minor_units;
use crate::models::{ledger_reference, EntryType, NewLedgerEntry, Order, OrderLineItem};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{
  CreatorCredit, SettlementCtxData, SettlementOutcome, SettlementReceipt, SettlementTrigger, UnpaidNotice,
};
use crate::services::gateway::{is_valid_reference, GatewayError, GatewayStatus};
use crate::state::AppState;
use crate::store::SettlementClaim;

pub fn register_settlement_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let paid: SkipCondition<SettlementCtxData> = Arc::new(|ctx: ContextData<SettlementCtxData>| {
    ctx.view(|d| d.verification.as_ref().is_some_and(|v| v.status == GatewayStatus::Success))
  });
  let unsettled: SkipCondition<SettlementCtxData> = Arc::new(|ctx: ContextData<SettlementCtxData>| {
    ctx.view(|d| !d.order.as_ref().is_some_and(|o| o.is_settled()))
  });
  let no_cart: SkipCondition<SettlementCtxData> =
    Arc::new(|ctx: ContextData<SettlementCtxData>| ctx.view(|d| d.cart_id().is_none()));

  let mut p = Pipeline::<SettlementCtxData, AppError>::new(&[
    ("verify_transaction", StepKind::Required, None),
    ("handle_unpaid", StepKind::Required, Some(paid)),
    ("load_order", StepKind::Required, None),
    ("restore_missing_credits", StepKind::Required, Some(unsettled)),
    ("short_circuit_settled", StepKind::Required, None),
    ("settle_and_credit", StepKind::Required, None),
    ("complete_cart", StepKind::Optional, Some(no_cart)),
    ("notify_parties", StepKind::BestEffort, None),
    ("build_receipt", StepKind::Required, None),
  ]);

  p.on("verify_transaction", verify_transaction);
  p.on("handle_unpaid", handle_unpaid);
  p.on("load_order", load_order);
  p.on("restore_missing_credits", restore_missing_credits);
  p.on("short_circuit_settled", short_circuit_settled);
  p.on("settle_and_credit", settle_and_credit);
  p.on("complete_cart", complete_cart);
  p.on("notify_parties", common_steps::notify_settlement_parties);
  p.on("build_receipt", build_receipt);

  flows.register(p);
}

/// Settles the payment identified by `reference`.
///
/// Returns `Settled` for the call that performed the settlement,
/// `AlreadyProcessed` for every other call on a settled order, and `NotPaid`
/// when the gateway does not report success.
#[instrument(name = "settle_payment", skip(app_state), fields(trigger = ?trigger))]
pub async fn settle_payment(
  app_state: &AppState,
  reference: &str,
  trigger: SettlementTrigger,
) -> AppResult<SettlementOutcome> {
  let reference = reference.trim();
  if !is_valid_reference(reference) {
    return Err(AppError::Validation("payment reference is missing or malformed".to_string()));
  }

  let ctx = ContextData::new(SettlementCtxData::new(app_state.clone(), reference, trigger));
  app_state.flows.run(ctx.clone()).await?;

  let outcome = ctx
    .update(|d| d.outcome.take())
    .ok_or_else(|| AppError::Internal("settlement finished without an outcome".to_string()))?;
  match &outcome {
    SettlementOutcome::Settled(r) => info!(order_id = %r.order_id, %reference, "Payment settled."),
    SettlementOutcome::AlreadyProcessed(r) => info!(order_id = %r.order_id, %reference, "Payment already settled."),
    SettlementOutcome::NotPaid(n) => info!(%reference, gateway_status = %n.gateway_status, "Payment not completed."),
  }
  Ok(outcome)
}

/// `settle_payment`, retrying transient gateway failures with backoff.
pub async fn settle_payment_with_retry(
  app_state: &AppState,
  reference: &str,
  trigger: SettlementTrigger,
) -> AppResult<SettlementOutcome> {
  app_state
    .verify_retry_policy()
    .run("settle_payment", move || settle_payment(app_state, reference, trigger))
    .await
}

async fn verify_transaction(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (gateway, reference, timeout) = ctx.view(|d| {
    (
      d.app_state.gateway.clone(),
      d.reference.clone(),
      d.app_state.config.gateway_timeout,
    )
  });

  let verified = tokio::time::timeout(timeout, gateway.verify_transaction(&reference))
    .await
    .map_err(|_| GatewayError::Timeout(timeout))??;

  if verified.reference != reference {
    warn!(%reference, reported = %verified.reference, "Gateway answered for a different reference.");
    return Err(AppError::Internal(format!(
      "gateway verification returned reference {} for {}",
      verified.reference, reference
    )));
  }
  debug!(%reference, status = %verified.status, amount_minor = verified.amount_minor, "Transaction verified.");
  ctx.update(|d| d.verification = Some(verified));
  Ok(PipelineControl::Continue)
}

async fn handle_unpaid(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (orders, reference, status) = ctx.view(|d| {
    (
      d.app_state.orders.clone(),
      d.reference.clone(),
      d.verification.as_ref().map(|v| v.status).unwrap_or(GatewayStatus::Pending),
    )
  });

  let order = orders.find_by_reference(&reference).await?;
  let mut order_cancelled = false;
  if let Some(order) = &order {
    if status.is_terminal_failure() && !order.is_settled() {
      order_cancelled = orders.mark_payment_failed(order.id).await?;
      if order_cancelled {
        info!(order_id = %order.id, %reference, %status, "Order cancelled after unsuccessful payment.");
      }
    }
  }

  ctx.update(|d| {
    d.outcome = Some(SettlementOutcome::NotPaid(UnpaidNotice {
      reference,
      gateway_status: status,
      order_id: order.map(|o| o.id),
      order_cancelled,
    }))
  });
  Ok(PipelineControl::Stop)
}

async fn load_order(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (orders, reference) = ctx.view(|d| (d.app_state.orders.clone(), d.reference.clone()));

  let order = orders
    .find_by_reference(&reference)
    .await?
    .ok_or_else(|| AppError::OrderNotFound {
      reference: reference.clone(),
    })?;

  let mismatch = ctx.view(|d| {
    d.verification.as_ref().and_then(|v| {
      let expected = to_minor_units(order.total_amount).ok()?;
      (v.amount_minor != expected || !v.currency.eq_ignore_ascii_case(&order.currency))
        .then(|| (v.amount_minor, expected, v.currency.clone()))
    })
  });
  if let Some((paid_minor, expected_minor, currency)) = mismatch {
    warn!(
      order_id = %order.id,
      paid_minor,
      expected_minor,
      %currency,
      "Gateway amount differs from the order total."
    );
  }

  ctx.update(|d| d.order = Some(order));
  Ok(PipelineControl::Continue)
}

async fn short_circuit_settled(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let settled = ctx.update(|d| {
    let order = d.order.as_ref().filter(|o| o.is_settled())?;
    let receipt = SettlementReceipt::for_order(order, &d.reference, Vec::new());
    d.outcome = Some(SettlementOutcome::AlreadyProcessed(receipt));
    Some(order.id)
  });
  match settled {
    Some(order_id) => {
      debug!(%order_id, "Order already settled; nothing to do.");
      Ok(PipelineControl::Stop)
    }
    None => Ok(PipelineControl::Continue),
  }
}

/// Sums line totals per creator. Zero shares are dropped.
pub fn creator_shares(items: &[OrderLineItem]) -> BTreeMap<Uuid, Decimal> {
  let mut shares: BTreeMap<Uuid, Decimal> = BTreeMap::new();
  for item in items {
    *shares.entry(item.creator_id).or_insert(Decimal::ZERO) += item.line_total();
  }
  shares.retain(|_, amount| *amount > Decimal::ZERO);
  shares
}

fn settlement_credits(order: &Order, shares: &BTreeMap<Uuid, Decimal>) -> Vec<NewLedgerEntry> {
  shares
    .iter()
    .map(|(creator_id, amount)| NewLedgerEntry::settlement_credit(*creator_id, order.id, &order.order_number, *amount))
    .collect()
}

async fn restore_missing_credits(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (orders, ledger, order) = ctx.view(|d| (d.app_state.orders.clone(), d.app_state.ledger.clone(), d.order.clone()));
  let order = order.ok_or_else(|| AppError::Internal("restore_missing_credits ran without an order".to_string()))?;

  let items = orders.line_items(order.id).await?;
  let existing = ledger.entries_by_reference(&ledger_reference(order.id)).await?;
  let missing: Vec<NewLedgerEntry> = settlement_credits(&order, &creator_shares(&items))
    .into_iter()
    .filter(|credit| {
      !existing
        .iter()
        .any(|e| e.user_id == credit.user_id && e.entry_type == EntryType::Credit)
    })
    .collect();

  let mut restored = 0usize;
  for credit in &missing {
    if ledger.record_entry_once(credit).await? {
      restored += 1;
    }
  }
  if restored > 0 {
    warn!(order_id = %order.id, restored, "Restored creator credits missing from a settled order.");
  }
  Ok(PipelineControl::Continue)
}

async fn settle_and_credit(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (orders, order) = ctx.view(|d| (d.app_state.orders.clone(), d.order.clone()));
  let order = order.ok_or_else(|| AppError::Internal("settle_and_credit ran without an order".to_string()))?;

  let items = orders.line_items(order.id).await?;
  let shares = creator_shares(&items);
  let credited_total: Decimal = shares.values().copied().sum();
  if credited_total != order.total_amount {
    warn!(
      order_id = %order.id,
      %credited_total,
      order_total = %order.total_amount,
      "Line items do not add up to the order total."
    );
  }

  let claim = orders.settle_and_credit(order.id, &settlement_credits(&order, &shares)).await?;
  // Either way the row now reads completed/confirmed.
  let current = orders
    .find_order(order.id)
    .await?
    .ok_or_else(|| AppError::Internal(format!("order {} vanished during settlement", order.id)))?;

  let recorded = match claim {
    SettlementClaim::Claimed { recorded } => recorded,
    SettlementClaim::AlreadySettled => {
      info!(order_id = %order.id, "Lost the settlement claim to a concurrent caller.");
      ctx.update(|d| {
        let receipt = SettlementReceipt::for_order(&current, &d.reference, Vec::new());
        d.outcome = Some(SettlementOutcome::AlreadyProcessed(receipt));
      });
      return Ok(PipelineControl::Stop);
    }
  };

  let credits: Vec<CreatorCredit> = shares
    .into_iter()
    .zip(recorded)
    .map(|((creator_id, amount), newly_recorded)| {
      if !newly_recorded {
        warn!(order_id = %order.id, %creator_id, "Ledger credit already present; skipping.");
      }
      CreatorCredit {
        creator_id,
        amount,
        newly_recorded,
      }
    })
    .collect();

  info!(order_id = %order.id, creators = credits.len(), "Order settled and creator wallets credited.");
  ctx.update(|d| {
    d.order = Some(current);
    d.line_items = items;
    d.credits = credits;
  });
  Ok(PipelineControl::Continue)
}

async fn complete_cart(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (carts, cart_id) = ctx.view(|d| (d.app_state.carts.clone(), d.cart_id()));
  let Some(cart_id) = cart_id else {
    return Ok(PipelineControl::Continue);
  };

  let completed = carts.complete_cart(cart_id).await?;
  if !completed {
    debug!(%cart_id, "Cart missing or already completed.");
  }
  ctx.update(|d| d.cart_completed = completed);
  Ok(PipelineControl::Continue)
}

async fn build_receipt(ctx: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  ctx.update(|d| {
    let order = d
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("build_receipt ran without an order".to_string()))?;
    let receipt = SettlementReceipt::for_order(order, &d.reference, d.credits.clone());
    d.outcome = Some(SettlementOutcome::Settled(receipt));
    Ok::<_, AppError>(())
  })?;
  Ok(PipelineControl::Continue)
}
