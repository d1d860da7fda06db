// settlement/src/store/postgres.rs

//! Postgres-backed implementation of every store trait.
//!
//! Schema lives in `migrations/`. The settlement claim is a conditional `UPDATE`
//! sharing one transaction with the creator credits: under READ COMMITTED a
//! concurrent loser blocks on the row lock, re-checks the predicate after the winner
//! commits and updates zero rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use super::{CartStore, LedgerStore, NotificationSink, OrderStore, SettlementClaim, StoreResult};
use crate::models::{Cart, CartLine, LedgerEntry, NewLedgerEntry, Notification, Order, OrderLineItem};

const ORDER_COLUMNS: &str = "id, order_number, buyer_id, buyer_email, total_amount, currency, payment_status, \
   order_status, payment_reference, cart_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

async fn insert_entry_once(tx: &mut Transaction<'_, Postgres>, entry: &NewLedgerEntry) -> StoreResult<bool> {
  let result = sqlx::query(
    "INSERT INTO wallet_transactions (id, user_id, amount, entry_type, status, description, reference) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) \
     ON CONFLICT (user_id, reference, entry_type) DO NOTHING",
  )
  .bind(Uuid::new_v4())
  .bind(entry.user_id)
  .bind(entry.amount)
  .bind(entry.entry_type)
  .bind(entry.status)
  .bind(&entry.description)
  .bind(&entry.reference)
  .execute(&mut **tx)
  .await?;
  Ok(result.rows_affected() == 1)
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "pg::insert_order", skip(self, order), fields(order_id = %order.id))]
  async fn insert_order(&self, order: &Order) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, buyer_id, buyer_email, total_amount, currency, payment_status, \
       order_status, payment_reference, cart_id, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.buyer_id)
    .bind(&order.buyer_email)
    .bind(order.total_amount)
    .bind(&order.currency)
    .bind(order.payment_status)
    .bind(order.order_status)
    .bind(&order.payment_reference)
    .bind(order.cart_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  #[instrument(name = "pg::insert_line_items", skip(self, items), fields(count = items.len()))]
  async fn insert_line_items(&self, items: &[OrderLineItem]) -> StoreResult<()> {
    let mut tx = self.pool.begin().await?;
    for item in items {
      sqlx::query(
        "INSERT INTO order_items (id, order_id, artwork_id, creator_id, quantity, unit_price, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
      )
      .bind(item.id)
      .bind(item.order_id)
      .bind(item.artwork_id)
      .bind(item.creator_id)
      .bind(item.quantity)
      .bind(item.unit_price)
      .bind(item.created_at)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  async fn delete_order(&self, order_id: Uuid) -> StoreResult<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
      .bind(order_id)
      .execute(&mut *tx)
      .await?;
    sqlx::query("DELETE FROM orders WHERE id = $1")
      .bind(order_id)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(())
  }

  async fn assign_payment_reference(&self, order_id: Uuid, reference: &str) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET payment_reference = $2, updated_at = NOW() WHERE id = $1 AND payment_reference IS NULL",
    )
    .bind(order_id)
    .bind(reference)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(order)
  }

  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
      "SELECT {} FROM orders WHERE payment_reference = $1",
      ORDER_COLUMNS
    ))
    .bind(reference)
    .fetch_optional(&self.pool)
    .await?;
    Ok(order)
  }

  async fn line_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderLineItem>> {
    let items = sqlx::query_as::<_, OrderLineItem>(
      "SELECT id, order_id, artwork_id, creator_id, quantity, unit_price, created_at \
       FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(items)
  }

  #[instrument(name = "pg::settle_and_credit", skip(self, credits), fields(credits = credits.len()))]
  async fn settle_and_credit(&self, order_id: Uuid, credits: &[NewLedgerEntry]) -> StoreResult<SettlementClaim> {
    let mut tx = self.pool.begin().await?;
    let claimed = sqlx::query(
      "UPDATE orders SET payment_status = 'completed', order_status = 'confirmed', updated_at = NOW() \
       WHERE id = $1 AND payment_status <> 'completed'",
    )
    .bind(order_id)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() != 1 {
      tx.rollback().await?;
      return Ok(SettlementClaim::AlreadySettled);
    }

    let mut recorded = Vec::with_capacity(credits.len());
    for entry in credits {
      recorded.push(insert_entry_once(&mut tx, entry).await?);
    }
    tx.commit().await?;
    Ok(SettlementClaim::Claimed { recorded })
  }

  async fn mark_payment_failed(&self, order_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET payment_status = 'failed', order_status = 'cancelled', updated_at = NOW() \
       WHERE id = $1 AND payment_status = 'pending'",
    )
    .bind(order_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn stale_pending_orders(&self, created_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
      "SELECT {} FROM orders WHERE payment_status = 'pending' AND payment_reference IS NOT NULL \
       AND created_at < $1 ORDER BY created_at LIMIT $2",
      ORDER_COLUMNS
    ))
    .bind(created_before)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }
}

#[async_trait]
impl LedgerStore for PgStore {
  #[instrument(name = "pg::record_entry_once", skip(self, entry), fields(user_id = %entry.user_id, reference = %entry.reference))]
  async fn record_entry_once(&self, entry: &NewLedgerEntry) -> StoreResult<bool> {
    let mut tx = self.pool.begin().await?;
    let recorded = insert_entry_once(&mut tx, entry).await?;
    tx.commit().await?;
    Ok(recorded)
  }

  async fn entries_by_reference(&self, reference: &str) -> StoreResult<Vec<LedgerEntry>> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
      "SELECT id, user_id, amount, entry_type, status, description, reference, created_at \
       FROM wallet_transactions WHERE reference = $1 ORDER BY created_at",
    )
    .bind(reference)
    .fetch_all(&self.pool)
    .await?;
    Ok(entries)
  }

  async fn entries_for_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<LedgerEntry>> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
      "SELECT id, user_id, amount, entry_type, status, description, reference, created_at \
       FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    Ok(entries)
  }

  async fn balance(&self, user_id: Uuid) -> StoreResult<Decimal> {
    let balance: Decimal = sqlx::query_scalar(
      "SELECT COALESCE(SUM(CASE WHEN entry_type = 'credit' THEN amount ELSE -amount END), 0)::NUMERIC \
       FROM wallet_transactions WHERE user_id = $1 AND status = 'completed'",
    )
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(balance)
  }
}

#[async_trait]
impl CartStore for PgStore {
  async fn active_cart(&self, owner_id: Uuid) -> StoreResult<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>(
      "SELECT id, owner_id, status, created_at, updated_at FROM carts WHERE owner_id = $1 AND status = 'active'",
    )
    .bind(owner_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(cart)
  }

  async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
      "SELECT ci.artwork_id, a.creator_id, a.title, ci.quantity, a.price AS unit_price \
       FROM cart_items ci JOIN artworks a ON a.id = ci.artwork_id \
       WHERE ci.cart_id = $1 ORDER BY ci.added_at",
    )
    .bind(cart_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(lines)
  }

  async fn complete_cart(&self, cart_id: Uuid) -> StoreResult<bool> {
    let result =
      sqlx::query("UPDATE carts SET status = 'completed', updated_at = NOW() WHERE id = $1 AND status = 'active'")
        .bind(cart_id)
        .execute(&self.pool)
        .await?;
    Ok(result.rows_affected() == 1)
  }
}

#[async_trait]
impl NotificationSink for PgStore {
  async fn deliver(&self, notification: &Notification) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO notifications (id, recipient_id, kind, title, message, link, order_id, artwork_id, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(notification.id)
    .bind(notification.recipient_id)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.link)
    .bind(notification.order_id)
    .bind(notification.artwork_id)
    .bind(notification.created_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}
