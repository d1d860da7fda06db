// settlement/src/models/order_item.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable line item snapshotting price and creator at checkout time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderLineItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub artwork_id: Uuid,
  /// Owner of the proceeds for this line.
  pub creator_id: Uuid,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub created_at: DateTime<Utc>,
}

impl OrderLineItem {
  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}
