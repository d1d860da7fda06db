// settlement/src/web/handlers/wallet_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
  pub limit: Option<i64>,
}

#[instrument(name = "handler::wallet_balance", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn wallet_balance_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let balance = app_state.ledger.balance(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({
    "user_id": auth_user.user_id,
    "balance": balance,
    "currency": app_state.config.currency_code,
  })))
}

#[instrument(name = "handler::wallet_transactions", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn wallet_transactions_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<TransactionsQuery>,
) -> Result<HttpResponse, AppError> {
  let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
  let entries = app_state.ledger.entries_for_user(auth_user.user_id, limit).await?;
  Ok(HttpResponse::Ok().json(json!({ "transactions": entries })))
}
