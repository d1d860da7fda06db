// settlement/src/store/memory.rs

//! In-process store used by tests and by the server when no `DATABASE_URL` is set.
//!
//! All tables sit behind one `RwLock`, so every conditional write below is
//! atomic with respect to every other call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use super::{CartStore, LedgerStore, NotificationSink, OrderStore, SettlementClaim, StoreError, StoreResult};
use crate::models::{
  Cart, CartLine, CartStatus, LedgerEntry, NewLedgerEntry, Notification, Order, OrderLineItem, OrderStatus,
  PaymentStatus,
};

#[derive(Default)]
struct Tables {
  orders: HashMap<Uuid, Order>,
  order_items: HashMap<Uuid, Vec<OrderLineItem>>,
  ledger: Vec<LedgerEntry>,
  carts: HashMap<Uuid, Cart>,
  cart_lines: HashMap<Uuid, Vec<CartLine>>,
  notifications: Vec<Notification>,
}

impl Tables {
  fn append_once(&mut self, entry: &NewLedgerEntry) -> bool {
    let exists = self
      .ledger
      .iter()
      .any(|e| e.user_id == entry.user_id && e.reference == entry.reference && e.entry_type == entry.entry_type);
    if !exists {
      self.ledger.push(entry.clone().into_entry());
    }
    !exists
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
  writes: AtomicUsize,
  fail_line_items: AtomicBool,
  fail_references: AtomicBool,
  fail_ledger: AtomicBool,
  fail_notifications: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn wrote(&self) {
    self.writes.fetch_add(1, Ordering::SeqCst);
  }

  /// Number of successful order, ledger and cart mutations so far.
  pub fn write_count(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  /// Makes `insert_line_items` fail, for exercising checkout compensation.
  pub fn fail_line_item_inserts(&self, fail: bool) {
    self.fail_line_items.store(fail, Ordering::SeqCst);
  }

  /// Makes `assign_payment_reference` fail.
  pub fn fail_reference_assignment(&self, fail: bool) {
    self.fail_references.store(fail, Ordering::SeqCst);
  }

  /// Makes every ledger write fail, including the credits of `settle_and_credit`.
  /// A failed settlement leaves the order untouched, as a rolled back transaction would.
  pub fn fail_ledger_writes(&self, fail: bool) {
    self.fail_ledger.store(fail, Ordering::SeqCst);
  }

  /// Makes every notification delivery fail.
  pub fn fail_notification_delivery(&self, fail: bool) {
    self.fail_notifications.store(fail, Ordering::SeqCst);
  }

  /// Creates an active cart for `owner_id` holding `lines`.
  pub fn seed_cart(&self, owner_id: Uuid, lines: Vec<CartLine>) -> Cart {
    let now = Utc::now();
    let cart = Cart {
      id: Uuid::new_v4(),
      owner_id,
      status: CartStatus::Active,
      created_at: now,
      updated_at: now,
    };
    let mut tables = self.tables.write();
    tables.cart_lines.insert(cart.id, lines);
    tables.carts.insert(cart.id, cart.clone());
    cart
  }

  pub fn seed_order(&self, order: Order, items: Vec<OrderLineItem>) {
    let mut tables = self.tables.write();
    tables.order_items.insert(order.id, items);
    tables.orders.insert(order.id, order);
  }

  pub fn cart(&self, cart_id: Uuid) -> Option<Cart> {
    self.tables.read().carts.get(&cart_id).cloned()
  }

  pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
    self.tables.read().ledger.clone()
  }

  pub fn notifications(&self) -> Vec<Notification> {
    self.tables.read().notifications.clone()
  }

  pub fn orders(&self) -> Vec<Order> {
    self.tables.read().orders.values().cloned().collect()
  }

  pub fn order_count(&self) -> usize {
    self.tables.read().orders.len()
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn insert_order(&self, order: &Order) -> StoreResult<()> {
    let mut tables = self.tables.write();
    if tables.orders.values().any(|o| o.order_number == order.order_number) {
      return Err(StoreError::Conflict(format!("order number {} already exists", order.order_number)));
    }
    tables.orders.insert(order.id, order.clone());
    drop(tables);
    self.wrote();
    Ok(())
  }

  async fn insert_line_items(&self, items: &[OrderLineItem]) -> StoreResult<()> {
    if self.fail_line_items.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("line item insert rejected".to_string()));
    }
    let mut tables = self.tables.write();
    for item in items {
      tables.order_items.entry(item.order_id).or_default().push(item.clone());
    }
    drop(tables);
    self.wrote();
    Ok(())
  }

  async fn delete_order(&self, order_id: Uuid) -> StoreResult<()> {
    let mut tables = self.tables.write();
    tables.order_items.remove(&order_id);
    let removed = tables.orders.remove(&order_id).is_some();
    drop(tables);
    if removed {
      self.wrote();
    }
    Ok(())
  }

  async fn assign_payment_reference(&self, order_id: Uuid, reference: &str) -> StoreResult<bool> {
    if self.fail_references.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("reference update rejected".to_string()));
    }
    let mut tables = self.tables.write();
    if tables.orders.values().any(|o| o.payment_reference.as_deref() == Some(reference)) {
      return Err(StoreError::Conflict(format!("payment reference {} already in use", reference)));
    }
    let assigned = match tables.orders.get_mut(&order_id) {
      Some(order) if order.payment_reference.is_none() => {
        order.payment_reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        true
      }
      _ => false,
    };
    drop(tables);
    if assigned {
      self.wrote();
    }
    Ok(assigned)
  }

  async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.tables.read().orders.get(&order_id).cloned())
  }

  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    Ok(
      self
        .tables
        .read()
        .orders
        .values()
        .find(|o| o.payment_reference.as_deref() == Some(reference))
        .cloned(),
    )
  }

  async fn line_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderLineItem>> {
    Ok(self.tables.read().order_items.get(&order_id).cloned().unwrap_or_default())
  }

  async fn settle_and_credit(&self, order_id: Uuid, credits: &[NewLedgerEntry]) -> StoreResult<SettlementClaim> {
    let mut tables = self.tables.write();
    match tables.orders.get(&order_id) {
      Some(order) if order.payment_status != PaymentStatus::Completed => {}
      _ => return Ok(SettlementClaim::AlreadySettled),
    }
    if !credits.is_empty() && self.fail_ledger.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("ledger write rejected".to_string()));
    }

    let recorded: Vec<bool> = credits.iter().map(|entry| tables.append_once(entry)).collect();
    if let Some(order) = tables.orders.get_mut(&order_id) {
      order.payment_status = PaymentStatus::Completed;
      order.order_status = OrderStatus::Confirmed;
      order.updated_at = Utc::now();
    }
    drop(tables);
    self.wrote();
    Ok(SettlementClaim::Claimed { recorded })
  }

  async fn mark_payment_failed(&self, order_id: Uuid) -> StoreResult<bool> {
    let mut tables = self.tables.write();
    let marked = match tables.orders.get_mut(&order_id) {
      Some(order) if order.payment_status == PaymentStatus::Pending => {
        order.payment_status = PaymentStatus::Failed;
        order.order_status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        true
      }
      _ => false,
    };
    drop(tables);
    if marked {
      self.wrote();
    }
    Ok(marked)
  }

  async fn stale_pending_orders(&self, created_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Order>> {
    let tables = self.tables.read();
    let mut stale: Vec<Order> = tables
      .orders
      .values()
      .filter(|o| {
        o.payment_status == PaymentStatus::Pending && o.payment_reference.is_some() && o.created_at < created_before
      })
      .cloned()
      .collect();
    stale.sort_by_key(|o| o.created_at);
    stale.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    Ok(stale)
  }
}

#[async_trait]
impl LedgerStore for MemoryStore {
  async fn record_entry_once(&self, entry: &NewLedgerEntry) -> StoreResult<bool> {
    if self.fail_ledger.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("ledger write rejected".to_string()));
    }
    let recorded = self.tables.write().append_once(entry);
    if recorded {
      self.wrote();
    }
    Ok(recorded)
  }

  async fn entries_by_reference(&self, reference: &str) -> StoreResult<Vec<LedgerEntry>> {
    Ok(self.tables.read().ledger.iter().filter(|e| e.reference == reference).cloned().collect())
  }

  async fn entries_for_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<LedgerEntry>> {
    let tables = self.tables.read();
    let entries = tables
      .ledger
      .iter()
      .rev()
      .filter(|e| e.user_id == user_id)
      .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
      .cloned()
      .collect();
    Ok(entries)
  }

  async fn balance(&self, user_id: Uuid) -> StoreResult<Decimal> {
    Ok(
      self
        .tables
        .read()
        .ledger
        .iter()
        .filter(|e| e.user_id == user_id)
        .map(LedgerEntry::signed_amount)
        .sum(),
    )
  }
}

#[async_trait]
impl CartStore for MemoryStore {
  async fn active_cart(&self, owner_id: Uuid) -> StoreResult<Option<Cart>> {
    Ok(
      self
        .tables
        .read()
        .carts
        .values()
        .find(|c| c.owner_id == owner_id && c.status == CartStatus::Active)
        .cloned(),
    )
  }

  async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>> {
    Ok(self.tables.read().cart_lines.get(&cart_id).cloned().unwrap_or_default())
  }

  async fn complete_cart(&self, cart_id: Uuid) -> StoreResult<bool> {
    let mut tables = self.tables.write();
    let completed = match tables.carts.get_mut(&cart_id) {
      Some(cart) if cart.status == CartStatus::Active => {
        cart.status = CartStatus::Completed;
        cart.updated_at = Utc::now();
        true
      }
      _ => false,
    };
    drop(tables);
    if completed {
      self.wrote();
    }
    Ok(completed)
  }
}

#[async_trait]
impl NotificationSink for MemoryStore {
  async fn deliver(&self, notification: &Notification) -> StoreResult<()> {
    if self.fail_notifications.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("notification store offline".to_string()));
    }
    self.tables.write().notifications.push(notification.clone());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn pending_order() -> Order {
    let mut order = Order::new_pending(Uuid::new_v4(), "buyer@example.com", dec!(100.00), "NGN", None);
    order.payment_reference = Some("PAY-1-abc".to_string());
    order
  }

  #[tokio::test]
  async fn claim_is_won_once() {
    let store = MemoryStore::new();
    let order = pending_order();
    store.seed_order(order.clone(), vec![]);
    let credit = NewLedgerEntry::settlement_credit(Uuid::new_v4(), order.id, &order.order_number, dec!(100.00));

    let first = store.settle_and_credit(order.id, &[credit.clone()]).await.unwrap();
    assert_eq!(first, SettlementClaim::Claimed { recorded: vec![true] });
    let second = store.settle_and_credit(order.id, &[credit]).await.unwrap();
    assert_eq!(second, SettlementClaim::AlreadySettled);

    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Completed);
    assert_eq!(stored.order_status, OrderStatus::Confirmed);
    assert_eq!(store.ledger_entries().len(), 1);
  }

  #[tokio::test]
  async fn failed_ledger_write_leaves_the_order_unclaimed() {
    let store = MemoryStore::new();
    let order = pending_order();
    store.seed_order(order.clone(), vec![]);
    let credit = NewLedgerEntry::settlement_credit(Uuid::new_v4(), order.id, &order.order_number, dec!(100.00));

    store.fail_ledger_writes(true);
    assert!(store.settle_and_credit(order.id, &[credit]).await.is_err());

    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    assert!(store.ledger_entries().is_empty());
    assert_eq!(store.write_count(), 0);
  }

  #[tokio::test]
  async fn claim_keeps_credits_written_by_an_earlier_attempt() {
    let store = MemoryStore::new();
    let order = pending_order();
    store.seed_order(order.clone(), vec![]);
    let credit = NewLedgerEntry::settlement_credit(Uuid::new_v4(), order.id, &order.order_number, dec!(100.00));
    store.record_entry_once(&credit).await.unwrap();

    let claim = store.settle_and_credit(order.id, &[credit]).await.unwrap();
    assert_eq!(claim, SettlementClaim::Claimed { recorded: vec![false] });
    assert_eq!(store.ledger_entries().len(), 1);
  }

  #[tokio::test]
  async fn failed_mark_never_touches_completed_orders() {
    let store = MemoryStore::new();
    let order = pending_order();
    store.seed_order(order.clone(), vec![]);
    store.settle_and_credit(order.id, &[]).await.unwrap();

    assert!(!store.mark_payment_failed(order.id).await.unwrap());
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Completed);
  }

  #[tokio::test]
  async fn payment_reference_is_assigned_once() {
    let store = MemoryStore::new();
    let order = Order::new_pending(Uuid::new_v4(), "buyer@example.com", dec!(5.00), "NGN", None);
    store.insert_order(&order).await.unwrap();

    assert!(store.assign_payment_reference(order.id, "PAY-1").await.unwrap());
    assert!(!store.assign_payment_reference(order.id, "PAY-2").await.unwrap());
    let stored = store.find_by_reference("PAY-1").await.unwrap().unwrap();
    assert_eq!(stored.id, order.id);
  }

  #[tokio::test]
  async fn duplicate_ledger_entries_are_skipped() {
    let store = MemoryStore::new();
    let creator = Uuid::new_v4();
    let entry = NewLedgerEntry::settlement_credit(creator, Uuid::new_v4(), "ORD-1", dec!(30.00));

    assert!(store.record_entry_once(&entry).await.unwrap());
    assert!(!store.record_entry_once(&entry).await.unwrap());
    assert_eq!(store.balance(creator).await.unwrap(), dec!(30.00));
  }
}
