// settlement/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::process_webhook;
use crate::services::signature::SIGNATURE_HEADER;
use crate::state::AppState;

#[instrument(name = "handler::gateway_webhook", skip(app_state, req, body), fields(payload_bytes = body.len()))]
pub async fn gateway_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(String::from);

  let processed = process_webhook(app_state.get_ref(), body, signature).await?;
  let already_processed = processed.outcome.as_ref().is_some_and(|o| o.is_already_processed());
  info!(ignored = processed.ignored, already_processed, "Webhook acknowledged.");

  Ok(HttpResponse::Ok().json(json!({
    "status": if processed.ignored { "ignored" } else { "ok" },
    "already_processed": already_processed,
  })))
}
