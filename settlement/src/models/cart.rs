// settlement/src/models/cart.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "cart_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
  Active,
  Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cart {
  pub id: Uuid,
  pub owner_id: Uuid,
  pub status: CartStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A cart row joined with the artwork's current price and creator.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
  pub artwork_id: Uuid,
  pub creator_id: Uuid,
  pub title: String,
  pub quantity: i32,
  pub unit_price: Decimal,
}

impl CartLine {
  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}
