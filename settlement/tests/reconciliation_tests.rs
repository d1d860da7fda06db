// tests/reconciliation_tests.rs
mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;

use marketplace_settlement::models::{OrderStatus, PaymentStatus};
use marketplace_settlement::pipelines::reconciliation::{spawn_reconciliation, sweep_stale_orders, SweepReport};
use marketplace_settlement::services::gateway::GatewayStatus;
use marketplace_settlement::services::gateway_mock::MockGateway;
use marketplace_settlement::store::{LedgerStore, OrderStore};

fn an_hour_ago() -> chrono::DateTime<Utc> {
  Utc::now() - ChronoDuration::hours(1)
}

#[tokio::test]
async fn test_sweep_settles_and_cancels_stale_orders() {
  let app = test_app();
  let paid_creator = Uuid::new_v4();
  let paid = seed_order_with(&app, &[(paid_creator, 1, dec!(400.00))], GatewayStatus::Success, true, an_hour_ago());
  let abandoned = seed_order_with(
    &app,
    &[(Uuid::new_v4(), 1, dec!(90.00))],
    GatewayStatus::Abandoned,
    true,
    an_hour_ago(),
  );
  let in_flight = seed_order_with(&app, &[(Uuid::new_v4(), 1, dec!(90.00))], GatewayStatus::Pending, true, an_hour_ago());
  // Too recent to be swept.
  let fresh = seed_order(&app, &[(Uuid::new_v4(), 1, dec!(55.00))], GatewayStatus::Success);

  let report = sweep_stale_orders(&app.state).await.unwrap();
  assert_eq!(
    report,
    SweepReport {
      examined: 3,
      settled: 1,
      already_processed: 0,
      not_paid: 2,
      failed: 0,
    }
  );

  let order = app.state.orders.find_order(paid.order.id).await.unwrap().unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Completed);
  assert_eq!(app.state.ledger.balance(paid_creator).await.unwrap(), dec!(400.00));

  let order = app.state.orders.find_order(abandoned.order.id).await.unwrap().unwrap();
  assert_eq!(order.order_status, OrderStatus::Cancelled);

  let order = app.state.orders.find_order(in_flight.order.id).await.unwrap().unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Pending);

  let order = app.state.orders.find_order(fresh.order.id).await.unwrap().unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Pending);

  // Only the in-flight order is still pending and stale.
  let report = sweep_stale_orders(&app.state).await.unwrap();
  assert_eq!(report.examined, 1);
  assert_eq!(report.not_paid, 1);
}

#[tokio::test]
async fn test_sweep_counts_gateway_failures_and_keeps_going() {
  let app = test_app();
  let flaky = seed_order_with(&app, &[(Uuid::new_v4(), 1, dec!(10.00))], GatewayStatus::Success, true, an_hour_ago());
  let healthy = seed_order_with(&app, &[(Uuid::new_v4(), 1, dec!(20.00))], GatewayStatus::Success, true, an_hour_ago());
  app.gateway.fail_next_verifications(&flaky.reference, 1);

  let report = sweep_stale_orders(&app.state).await.unwrap();
  assert_eq!(report.examined, 2);
  assert_eq!(report.failed, 1);
  assert_eq!(report.settled, 1);

  let order = app.state.orders.find_order(healthy.order.id).await.unwrap().unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_background_task_sweeps_on_its_interval() {
  let app = test_app_with(test_config(), MockGateway::new());
  let seeded = seed_order_with(&app, &[(Uuid::new_v4(), 1, dec!(10.00))], GatewayStatus::Success, true, an_hour_ago());

  let handle = spawn_reconciliation(app.state.clone(), Duration::from_millis(20));
  let mut settled = false;
  for _ in 0..50 {
    tokio::time::sleep(Duration::from_millis(10)).await;
    let order = app.state.orders.find_order(seeded.order.id).await.unwrap().unwrap();
    if order.payment_status == PaymentStatus::Completed {
      settled = true;
      break;
    }
  }
  handle.abort();
  assert!(settled, "background sweep never settled the order");
}
