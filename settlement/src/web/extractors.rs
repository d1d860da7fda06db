// settlement/src/web/extractors.rs

use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// The caller's user id, taken from the `X-User-ID` header set by the upstream
/// identity proxy.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let user_id = req
      .headers()
      .get(USER_ID_HEADER)
      .and_then(|h| h.to_str().ok())
      .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    match user_id {
      Some(user_id) => ready(Ok(AuthenticatedUser { user_id })),
      None => {
        warn!("Missing or invalid {} header.", USER_ID_HEADER);
        ready(Err(AppError::Auth(format!("missing or invalid {} header", USER_ID_HEADER))))
      }
    }
  }
}
