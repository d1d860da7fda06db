// settlement/src/pipelines/checkout_pipeline.rs

//! Checkout: turns the buyer's active cart into a pending order with line-item
//! snapshots, reserves a payment reference and opens a gateway transaction.
//!
//! The reference is stored on the order before the gateway hears about it, so a
//! webhook can never arrive for a reference no order carries.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use stepflow::{ContextData, Flows, Pipeline, PipelineControl, StepKind};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::money::to_minor_units;
use crate::models::{CartLine, Order, OrderLineItem};
use crate::pipelines::contexts::{CheckoutCtxData, CheckoutSession};
use crate::services::gateway::{generate_reference, InitializeRequest};
use crate::state::AppState;

pub fn register_checkout_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("load_active_cart", StepKind::Required, None),
    ("create_order_record", StepKind::Required, None),
    ("snapshot_line_items", StepKind::Required, None),
    ("assign_payment_reference", StepKind::Required, None),
    ("initialize_transaction", StepKind::Required, None),
  ]);

  p.on("load_active_cart", load_active_cart);
  p.on("create_order_record", create_order_record);
  p.on("snapshot_line_items", snapshot_line_items);
  p.on("assign_payment_reference", assign_payment_reference);
  p.on("initialize_transaction", initialize_transaction);

  flows.register(p);
}

fn validate_lines(lines: &[CartLine]) -> AppResult<()> {
  if lines.is_empty() {
    return Err(AppError::Validation("cart is empty".to_string()));
  }
  if let Some(bad) = lines.iter().find(|l| l.quantity <= 0 || l.unit_price < Decimal::ZERO) {
    return Err(AppError::Validation(format!(
      "cart line for artwork {} has an invalid quantity or price",
      bad.artwork_id
    )));
  }
  Ok(())
}

async fn load_active_cart(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (carts, buyer_id) = ctx.view(|d| (d.app_state.carts.clone(), d.buyer_id));

  let cart = carts
    .active_cart(buyer_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("no active cart for user {}", buyer_id)))?;
  let lines = carts.cart_lines(cart.id).await?;
  validate_lines(&lines)?;

  ctx.update(|d| {
    d.cart = Some(cart);
    d.cart_lines = lines;
  });
  Ok(PipelineControl::Continue)
}

async fn create_order_record(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (orders, order) = ctx.view(|d| {
    let total: Decimal = d.cart_lines.iter().map(CartLine::line_total).sum();
    let order = Order::new_pending(
      d.buyer_id,
      &d.buyer_email,
      total,
      &d.app_state.config.currency_code,
      d.cart.as_ref().map(|c| c.id),
    );
    (d.app_state.orders.clone(), order)
  });
  // Rejects free orders before anything is written.
  to_minor_units(order.total_amount)?;

  orders.insert_order(&order).await?;
  info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "Order created.");
  ctx.update(|d| d.order = Some(order));
  Ok(PipelineControl::Continue)
}

async fn snapshot_line_items(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (orders, order_id, lines) = ctx.view(|d| {
    (
      d.app_state.orders.clone(),
      d.order.as_ref().map(|o| o.id),
      d.cart_lines.clone(),
    )
  });
  let order_id = order_id.ok_or_else(|| AppError::Internal("snapshot_line_items ran without an order".to_string()))?;

  let created_at = chrono::Utc::now();
  let items: Vec<OrderLineItem> = lines
    .iter()
    .map(|line| OrderLineItem {
      id: Uuid::new_v4(),
      order_id,
      artwork_id: line.artwork_id,
      creator_id: line.creator_id,
      quantity: line.quantity,
      unit_price: line.unit_price,
      created_at,
    })
    .collect();

  if let Err(e) = orders.insert_line_items(&items).await {
    error!(%order_id, error = %e, "Line item snapshot failed; removing the order.");
    if let Err(cleanup) = orders.delete_order(order_id).await {
      error!(%order_id, error = %cleanup, "Could not remove the half-created order.");
    }
    ctx.update(|d| d.order = None);
    return Err(e.into());
  }

  ctx.update(|d| d.line_items = items);
  Ok(PipelineControl::Continue)
}

async fn assign_payment_reference(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (orders, order_id) = ctx.view(|d| (d.app_state.orders.clone(), d.order.as_ref().map(|o| o.id)));
  let order_id =
    order_id.ok_or_else(|| AppError::Internal("assign_payment_reference ran without an order".to_string()))?;

  let reference = generate_reference();
  let failure = match orders.assign_payment_reference(order_id, &reference).await {
    Ok(true) => None,
    Ok(false) => Some(AppError::Internal(format!("order {} already carries a payment reference", order_id))),
    Err(e) => Some(e.into()),
  };
  if let Some(err) = failure {
    // Never seen by the gateway, so nothing can settle it later.
    error!(%order_id, error = %err, "Payment reference not stored; removing the order.");
    if let Err(cleanup) = orders.delete_order(order_id).await {
      error!(%order_id, error = %cleanup, "Could not remove the unreferenced order.");
    }
    ctx.update(|d| d.order = None);
    return Err(err);
  }
  ctx.update(|d| {
    if let Some(order) = d.order.as_mut() {
      order.payment_reference = Some(reference.clone());
    }
    d.reference = Some(reference);
  });
  Ok(PipelineControl::Continue)
}

async fn initialize_transaction(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (app_state, order, reference, buyer_email) =
    ctx.view(|d| (d.app_state.clone(), d.order.clone(), d.reference.clone(), d.buyer_email.clone()));
  let (order, reference) = match (order, reference) {
    (Some(order), Some(reference)) => (order, reference),
    _ => {
      return Err(AppError::Internal(
        "initialize_transaction ran without an order and reference".to_string(),
      ))
    }
  };

  let request = InitializeRequest {
    email: buyer_email,
    amount_minor: to_minor_units(order.total_amount)?,
    reference: Some(reference.clone()),
    currency: order.currency.clone(),
    callback_url: app_state.config.callback_url.clone(),
    metadata: json!({
      "order_id": order.id,
      "order_number": order.order_number,
      "buyer_id": order.buyer_id,
      "cart_id": order.cart_id,
    }),
  };

  let initialized = match app_state.gateway.initialize_transaction(&request).await {
    Ok(initialized) => initialized,
    Err(e) => {
      warn!(order_id = %order.id, error = %e, "Gateway initialization failed; cancelling the order.");
      if let Err(mark_err) = app_state.orders.mark_payment_failed(order.id).await {
        error!(order_id = %order.id, error = %mark_err, "Could not cancel the order.");
      }
      return Err(e.into());
    }
  };

  if initialized.reference != reference {
    return Err(AppError::Internal(format!(
      "gateway echoed reference {} for {}",
      initialized.reference, reference
    )));
  }

  info!(order_id = %order.id, %reference, "Gateway transaction initialized.");
  ctx.update(|d| d.transaction = Some(initialized));
  Ok(PipelineControl::Continue)
}

/// Runs the checkout pipeline for `buyer_id`.
pub async fn start_checkout(
  app_state: &AppState,
  buyer_id: Uuid,
  buyer_email: &str,
) -> AppResult<CheckoutSession> {
  let ctx = ContextData::new(CheckoutCtxData::new(app_state.clone(), buyer_id, buyer_email));
  app_state.flows.run(ctx.clone()).await?;
  ctx
    .view(CheckoutCtxData::session)
    .ok_or_else(|| AppError::Internal("checkout finished without a payment session".to_string()))
}
