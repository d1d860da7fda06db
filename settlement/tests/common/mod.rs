// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::Level;
use uuid::Uuid;

use marketplace_settlement::config::AppConfig;
use marketplace_settlement::models::money::to_minor_units;
use marketplace_settlement::models::{CartLine, Order, OrderLineItem};
use marketplace_settlement::services::gateway::{generate_reference, GatewayStatus};
use marketplace_settlement::services::gateway_mock::MockGateway;
use marketplace_settlement::services::signature::sign_payload;
use marketplace_settlement::state::{AppState, Backends};
use marketplace_settlement::store::MemoryStore;

pub const WEBHOOK_SECRET: &str = "sk_test_webhook_secret";

static TRACING: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

pub fn test_config() -> AppConfig {
  AppConfig {
    webhook_secret: WEBHOOK_SECRET.to_string(),
    verify_retry_base: Duration::from_millis(1),
    gateway_timeout: Duration::from_secs(2),
    reconcile_stale_after: Duration::from_secs(60),
    ..AppConfig::default()
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockGateway>,
}

pub fn test_app() -> TestApp {
  test_app_with(test_config(), MockGateway::new())
}

pub fn test_app_with(config: AppConfig, gateway: MockGateway) -> TestApp {
  setup_tracing();
  let store = Arc::new(MemoryStore::new());
  let gateway = Arc::new(gateway);
  let state = AppState::new(
    Arc::new(config),
    Backends {
      orders: store.clone(),
      ledger: store.clone(),
      carts: store.clone(),
      notifications: store.clone(),
      gateway: gateway.clone(),
    },
  );
  TestApp { state, store, gateway }
}

/// `(creator_id, quantity, unit_price)`
pub type LineSpec = (Uuid, i32, Decimal);

pub fn cart_lines(lines: &[LineSpec]) -> Vec<CartLine> {
  lines
    .iter()
    .enumerate()
    .map(|(i, (creator_id, quantity, unit_price))| CartLine {
      artwork_id: Uuid::new_v4(),
      creator_id: *creator_id,
      title: format!("Artwork #{}", i + 1),
      quantity: *quantity,
      unit_price: *unit_price,
    })
    .collect()
}

pub struct SeededOrder {
  pub order: Order,
  pub items: Vec<OrderLineItem>,
  pub reference: String,
  pub cart_id: Option<Uuid>,
}

impl SeededOrder {
  pub fn buyer_id(&self) -> Uuid {
    self.order.buyer_id
  }
}

/// A pending order with a payment reference, as checkout leaves it, plus a
/// gateway transaction reporting `status` for the full amount.
pub fn seed_order(app: &TestApp, lines: &[LineSpec], status: GatewayStatus) -> SeededOrder {
  seed_order_with(app, lines, status, true, Utc::now())
}

pub fn seed_order_with(
  app: &TestApp,
  lines: &[LineSpec],
  status: GatewayStatus,
  with_cart: bool,
  created_at: chrono::DateTime<Utc>,
) -> SeededOrder {
  let buyer_id = Uuid::new_v4();
  let lines = cart_lines(lines);
  let total: Decimal = lines.iter().map(CartLine::line_total).sum();
  let cart_id = with_cart.then(|| app.store.seed_cart(buyer_id, lines.clone()).id);

  let reference = generate_reference();
  let mut order = Order::new_pending(buyer_id, "buyer@example.com", total, "NGN", cart_id);
  order.payment_reference = Some(reference.clone());
  order.created_at = created_at;
  order.updated_at = created_at;

  let items: Vec<OrderLineItem> = lines
    .iter()
    .map(|line| OrderLineItem {
      id: Uuid::new_v4(),
      order_id: order.id,
      artwork_id: line.artwork_id,
      creator_id: line.creator_id,
      quantity: line.quantity,
      unit_price: line.unit_price,
      created_at,
    })
    .collect();
  app.store.seed_order(order.clone(), items.clone());

  let metadata = match cart_id {
    Some(cart_id) => json!({ "order_id": order.id, "cart_id": cart_id }),
    None => json!({ "order_id": order.id }),
  };
  let amount_minor = to_minor_units(total).unwrap_or(0);
  app.gateway.register_transaction(&reference, amount_minor, status, metadata);

  SeededOrder {
    order,
    items,
    reference,
    cart_id,
  }
}

pub fn charge_success_body(reference: &str) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "event": "charge.success",
    "data": { "reference": reference, "status": "success" }
  }))
  .unwrap()
}

pub fn sign(body: &[u8]) -> String {
  sign_payload(WEBHOOK_SECRET, body)
}
