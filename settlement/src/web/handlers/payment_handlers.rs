// settlement/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::instrument;

use crate::errors::AppError;
use crate::pipelines::contexts::{SettlementOutcome, SettlementTrigger};
use crate::pipelines::settle_payment_with_retry;
use crate::state::AppState;

/// Callback target after the buyer returns from the gateway's payment page.
///
/// Settled and already-settled payments answer 200 with the receipt. Anything the
/// gateway does not report as paid answers `not_yet_paid`.
#[instrument(name = "handler::verify_payment", skip(app_state))]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  reference: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let reference = reference.into_inner();
  let outcome = settle_payment_with_retry(app_state.get_ref(), &reference, SettlementTrigger::Callback).await?;

  match outcome {
    SettlementOutcome::NotPaid(notice) => Err(AppError::PaymentNotCompleted {
      reference: notice.reference,
      status: notice.gateway_status.to_string(),
    }),
    settled => Ok(HttpResponse::Ok().json(settled)),
  }
}
