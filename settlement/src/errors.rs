// settlement/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use stepflow::FlowError;
use thiserror::Error;

use crate::models::money::MoneyError;
use crate::services::gateway::GatewayError;
use crate::store::StoreError;

/// Machine-readable error class carried in every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  InvalidRequest,
  Unauthorized,
  NotFound,
  NotYetPaid,
  GatewayUnavailable,
  Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  /// The gateway knows the reference but no order carries it.
  #[error("No order found for payment reference {reference}")]
  OrderNotFound { reference: String },

  #[error("Payment {reference} is not completed (gateway status: {status})")]
  PaymentNotCompleted { reference: String, status: String },

  #[error("Payment Gateway Error: {0}")]
  Gateway(#[from] GatewayError),

  #[error("Invalid Amount: {0}")]
  Money(#[from] MoneyError),

  #[error("Store Error: {0}")]
  Store(#[from] StoreError),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<sqlx::Error> for AppError {
  fn from(err: sqlx::Error) -> Self {
    AppError::Store(StoreError::from(err))
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    AppError::Internal(err.to_string())
  }
}

impl AppError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      AppError::Validation(_) | AppError::Money(_) => ErrorKind::InvalidRequest,
      AppError::Auth(_) => ErrorKind::Unauthorized,
      AppError::NotFound(_) | AppError::OrderNotFound { .. } => ErrorKind::NotFound,
      AppError::PaymentNotCompleted { .. } => ErrorKind::NotYetPaid,
      AppError::Gateway(e) if e.is_transient() => ErrorKind::GatewayUnavailable,
      AppError::Gateway(GatewayError::NotFound { .. }) => ErrorKind::NotFound,
      AppError::Gateway(_)
      | AppError::Store(_)
      | AppError::Config(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => ErrorKind::Internal,
    }
  }

  /// Whether repeating the whole operation may succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::Gateway(e) if e.is_transient())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self.kind() {
      ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
      ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::NotYetPaid => StatusCode::PAYMENT_REQUIRED,
      ErrorKind::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let kind = self.kind();
    if kind == ErrorKind::Internal {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, ?kind, "Responding with error");
    }
    // Internal details stay in the logs.
    let message = match kind {
      ErrorKind::Internal => "An internal error occurred".to_string(),
      _ => self.to_string(),
    };
    HttpResponse::build(self.status_code()).json(json!({ "kind": kind, "message": message }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
