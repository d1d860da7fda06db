// settlement/src/models/order.rs

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Completed,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Cancelled,
}

/// A buyer's order.
///
/// `payment_status = Completed` implies `order_status = Confirmed`. The payment
/// reference is assigned once and never changed afterwards.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub buyer_id: Uuid,
  pub buyer_email: String,
  pub total_amount: Decimal,
  pub currency: String,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub payment_reference: Option<String>,
  pub cart_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// A fresh `pending/pending` order with no payment reference yet.
  pub fn new_pending(buyer_id: Uuid, buyer_email: &str, total_amount: Decimal, currency: &str, cart_id: Option<Uuid>) -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      order_number: generate_order_number(now),
      buyer_id,
      buyer_email: buyer_email.to_string(),
      total_amount,
      currency: currency.to_string(),
      payment_status: PaymentStatus::Pending,
      order_status: OrderStatus::Pending,
      payment_reference: None,
      cart_id,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_settled(&self) -> bool {
    self.payment_status == PaymentStatus::Completed
  }
}

/// `ORD-<yyyymmddHHMMSS>-<6 random uppercase alphanumerics>`.
pub fn generate_order_number(at: DateTime<Utc>) -> String {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(6)
    .map(|b| (b as char).to_ascii_uppercase())
    .collect();
  format!("ORD-{}-{}", at.format("%Y%m%d%H%M%S"), suffix)
}
