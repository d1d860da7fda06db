// settlement/src/models/wallet.rs

//! Wallet ledger: an append-only journal of credits and debits.
//! Balances are always derived from the entries, never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "ledger_entry_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
  Credit,
  Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "ledger_entry_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
  Pending,
  Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
  pub id: Uuid,
  pub user_id: Uuid,
  /// Always positive; direction comes from `entry_type`.
  pub amount: Decimal,
  pub entry_type: EntryType,
  pub status: EntryStatus,
  pub description: String,
  pub reference: String,
  pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
  /// Contribution of this entry to the owner's balance.
  pub fn signed_amount(&self) -> Decimal {
    match (self.status, self.entry_type) {
      (EntryStatus::Completed, EntryType::Credit) => self.amount,
      (EntryStatus::Completed, EntryType::Debit) => -self.amount,
      (EntryStatus::Pending, _) => Decimal::ZERO,
    }
  }
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
  pub user_id: Uuid,
  pub amount: Decimal,
  pub entry_type: EntryType,
  pub status: EntryStatus,
  pub description: String,
  pub reference: String,
}

impl NewLedgerEntry {
  /// A completed settlement credit for `creator_id`'s share of `order_id`.
  pub fn settlement_credit(creator_id: Uuid, order_id: Uuid, order_number: &str, amount: Decimal) -> Self {
    Self {
      user_id: creator_id,
      amount,
      entry_type: EntryType::Credit,
      status: EntryStatus::Completed,
      description: format!("Sale proceeds for order {}", order_number),
      reference: ledger_reference(order_id),
    }
  }

  pub fn into_entry(self) -> LedgerEntry {
    LedgerEntry {
      id: Uuid::new_v4(),
      user_id: self.user_id,
      amount: self.amount,
      entry_type: self.entry_type,
      status: self.status,
      description: self.description,
      reference: self.reference,
      created_at: Utc::now(),
    }
  }
}

/// Deterministic ledger reference for an order: `ORDER_<order_id>`.
pub fn ledger_reference(order_id: Uuid) -> String {
  format!("ORDER_{}", order_id)
}
