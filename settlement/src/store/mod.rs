// settlement/src/store/mod.rs

//! Persistence seams of the settlement core.
//!
//! Pipelines only see these traits. `MemoryStore` backs tests and local runs,
//! `PgStore` backs production. Every mutation that guards an invariant is a
//! conditional write whose boolean result says whether this caller won.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Cart, CartLine, LedgerEntry, NewLedgerEntry, Notification, Order, OrderLineItem};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("conflicting write: {0}")]
  Conflict(String),

  #[error("store unavailable: {0}")]
  Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What [`OrderStore::settle_and_credit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementClaim {
  /// This caller flipped the order. `recorded[i]` is whether `credits[i]` was newly written.
  Claimed { recorded: Vec<bool> },
  /// The order was already completed or does not exist. Nothing was written.
  AlreadySettled,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn insert_order(&self, order: &Order) -> StoreResult<()>;

  /// Inserts all items or none.
  async fn insert_line_items(&self, items: &[OrderLineItem]) -> StoreResult<()>;

  /// Removes an order and its items. Used to undo a half-created checkout.
  async fn delete_order(&self, order_id: Uuid) -> StoreResult<()>;

  /// Sets the payment reference if none is set yet. Returns `false` otherwise.
  async fn assign_payment_reference(&self, order_id: Uuid, reference: &str) -> StoreResult<bool>;

  async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>>;

  async fn line_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderLineItem>>;

  /// Moves the order to `completed/confirmed` iff it is not completed yet and, in the
  /// same transaction, appends `credits` with `record_entry_once` semantics. Either the
  /// status flip and every credit commit together or nothing does. Exactly one of any
  /// number of concurrent callers gets `Claimed`.
  async fn settle_and_credit(&self, order_id: Uuid, credits: &[NewLedgerEntry]) -> StoreResult<SettlementClaim>;

  /// Moves a still-pending order to `failed/cancelled`. Completed orders are never touched.
  async fn mark_payment_failed(&self, order_id: Uuid) -> StoreResult<bool>;

  /// Pending orders with a payment reference, created before `created_before`, oldest first.
  async fn stale_pending_orders(&self, created_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Order>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
  /// Appends `entry` unless one with the same user, reference and type exists.
  /// Returns whether a row was written.
  async fn record_entry_once(&self, entry: &NewLedgerEntry) -> StoreResult<bool>;

  async fn entries_by_reference(&self, reference: &str) -> StoreResult<Vec<LedgerEntry>>;

  /// Newest first.
  async fn entries_for_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<LedgerEntry>>;

  /// Sum of completed credits minus completed debits.
  async fn balance(&self, user_id: Uuid) -> StoreResult<Decimal>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
  async fn active_cart(&self, owner_id: Uuid) -> StoreResult<Option<Cart>>;

  async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>>;

  /// `active -> completed`. Returns `false` when the cart is missing or already completed.
  async fn complete_cart(&self, cart_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn deliver(&self, notification: &Notification) -> StoreResult<()>;
}
