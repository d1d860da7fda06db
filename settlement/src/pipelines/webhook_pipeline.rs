// settlement/src/pipelines/webhook_pipeline.rs

//! Gateway webhooks: authenticate, parse, settle, acknowledge.
//!
//! Redeliveries of an already-settled payment are acknowledged like the first
//! delivery. Transient failures surface as errors so the gateway retries later.

use std::sync::Arc;

use stepflow::{ContextData, Flows, Pipeline, PipelineControl, StepKind};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::{GatewayEvent, SettlementTrigger, WebhookCtxData, CHARGE_SUCCESS_EVENT};
use crate::pipelines::settlement_pipeline::settle_payment;
use crate::services::signature::verify_signature;
use crate::state::AppState;

pub fn register_webhook_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<WebhookCtxData, AppError>::new(&[
    ("verify_signature", StepKind::Required, None),
    ("parse_event", StepKind::Required, None),
    ("settle_payment", StepKind::Required, None),
    ("acknowledge", StepKind::Required, None),
  ]);

  p.on("verify_signature", |ctx: ContextData<WebhookCtxData>| async move {
    let valid = ctx.view(|d| match &d.signature {
      Some(signature) => verify_signature(&d.app_state.config.webhook_secret, &d.raw_body, signature),
      None => false,
    });
    if !valid {
      warn!("Webhook rejected: missing or invalid signature.");
      return Err(AppError::Auth("invalid webhook signature".to_string()));
    }
    Ok(PipelineControl::Continue)
  });

  p.on("parse_event", parse_event);
  p.on("settle_payment", settle_from_event);

  p.on("acknowledge", |ctx: ContextData<WebhookCtxData>| async move {
    ctx.update(|d| d.acknowledged = true);
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  flows.register(p);
}

async fn parse_event(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let event: GatewayEvent = ctx
    .view(|d| serde_json::from_slice(&d.raw_body))
    .map_err(|e| AppError::Validation(format!("malformed webhook payload: {}", e)))?;

  if event.event != CHARGE_SUCCESS_EVENT {
    debug!(event = %event.event, "Ignoring webhook event.");
    ctx.update(|d| {
      d.event = Some(event);
      d.ignored = true;
      d.acknowledged = true;
    });
    return Ok(PipelineControl::Stop);
  }
  ctx.update(|d| d.event = Some(event));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "webhook::settle_from_event", skip(ctx))]
async fn settle_from_event(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let (app_state, reference) = ctx.view(|d| (d.app_state.clone(), d.event.as_ref().map(|e| e.data.reference.clone())));
  let reference = reference.ok_or_else(|| AppError::Internal("settle_payment ran without an event".to_string()))?;

  match settle_payment(&app_state, &reference, SettlementTrigger::Webhook).await {
    Ok(outcome) => {
      info!(%reference, already_processed = outcome.is_already_processed(), "Webhook settlement finished.");
      ctx.update(|d| d.outcome = Some(outcome));
      Ok(PipelineControl::Continue)
    }
    // Redelivering an unknown reference cannot fix it.
    Err(e @ AppError::OrderNotFound { .. }) => {
      error!(%reference, error = %e, "Webhook for a reference no order carries.");
      ctx.update(|d| d.ignored = true);
      Ok(PipelineControl::Continue)
    }
    Err(e) => Err(e),
  }
}

/// Runs the webhook pipeline over a raw request body and its signature header.
pub async fn process_webhook(
  app_state: &AppState,
  raw_body: actix_web::web::Bytes,
  signature: Option<String>,
) -> AppResult<WebhookCtxData> {
  let ctx = ContextData::new(WebhookCtxData::new(app_state.clone(), raw_body, signature));
  app_state.flows.run(ctx.clone()).await?;
  Ok(ctx.snapshot())
}
