// settlement/src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  OrderConfirmed,
  SaleMade,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      NotificationKind::OrderConfirmed => "order_confirmed",
      NotificationKind::SaleMade => "sale_made",
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
  pub id: Uuid,
  pub recipient_id: Uuid,
  /// Type tag, see `NotificationKind::as_str`.
  pub kind: String,
  pub title: String,
  pub message: String,
  pub link: Option<String>,
  pub order_id: Option<Uuid>,
  pub artwork_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}
