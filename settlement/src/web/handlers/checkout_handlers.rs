// settlement/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::start_checkout;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
  /// Receipt address handed to the gateway.
  pub email: String,
}

#[instrument(name = "handler::start_checkout", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn start_checkout_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let email = payload.email.trim();
  if email.is_empty() || !email.contains('@') {
    return Err(AppError::Validation("a valid email is required".to_string()));
  }

  let session = start_checkout(app_state.get_ref(), auth_user.user_id, email).await?;
  info!(order_id = %session.order_id, reference = %session.reference, "Checkout started.");
  Ok(HttpResponse::Created().json(session))
}
