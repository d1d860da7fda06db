// tests/webhook_tests.rs
mod common;

use actix_web::web::Bytes;
use common::*;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use marketplace_settlement::errors::ErrorKind;
use marketplace_settlement::pipelines::contexts::SettlementOutcome;
use marketplace_settlement::pipelines::process_webhook;
use marketplace_settlement::services::gateway::GatewayStatus;
use marketplace_settlement::store::LedgerStore;

#[tokio::test]
async fn test_signed_charge_success_settles_and_redelivery_is_acknowledged() {
  let app = test_app();
  let creator = Uuid::new_v4();
  let seeded = seed_order(&app, &[(creator, 1, dec!(5000.00))], GatewayStatus::Success);
  let body = charge_success_body(&seeded.reference);

  let first = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap();
  assert!(first.acknowledged);
  assert!(!first.ignored);
  assert!(matches!(first.outcome, Some(SettlementOutcome::Settled(_))));

  let redelivery = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap();
  assert!(redelivery.acknowledged);
  assert!(matches!(redelivery.outcome, Some(SettlementOutcome::AlreadyProcessed(_))));

  assert_eq!(app.store.ledger_entries().len(), 1);
  assert_eq!(app.state.ledger.balance(creator).await.unwrap(), dec!(5000.00));
}

#[tokio::test]
async fn test_bad_or_missing_signature_is_rejected_before_any_work() {
  let app = test_app();
  let seeded = seed_order(&app, &[(Uuid::new_v4(), 1, dec!(5000.00))], GatewayStatus::Success);
  let body = charge_success_body(&seeded.reference);

  let forged = process_webhook(&app.state, Bytes::from(body.clone()), Some("deadbeef".to_string()))
    .await
    .unwrap_err();
  assert_eq!(forged.kind(), ErrorKind::Unauthorized);

  let unsigned = process_webhook(&app.state, Bytes::from(body), None).await.unwrap_err();
  assert_eq!(unsigned.kind(), ErrorKind::Unauthorized);

  assert_eq!(app.gateway.verify_calls(), 0);
  assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn test_other_events_are_acknowledged_and_ignored() {
  let app = test_app();
  let body = serde_json::to_vec(&json!({
    "event": "transfer.success",
    "data": { "reference": "TRF-1" }
  }))
  .unwrap();

  let processed = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap();
  assert!(processed.ignored);
  assert!(processed.acknowledged);
  assert!(processed.outcome.is_none());
  assert_eq!(app.gateway.verify_calls(), 0);
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_acknowledged() {
  let app = test_app();
  app
    .gateway
    .register_transaction("PAY-orphan", 10_000, GatewayStatus::Success, serde_json::Value::Null);
  let body = charge_success_body("PAY-orphan");

  let processed = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap();
  assert!(processed.ignored);
  assert!(processed.acknowledged);
  assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn test_transient_gateway_failure_asks_for_redelivery() {
  let app = test_app();
  let seeded = seed_order(&app, &[(Uuid::new_v4(), 1, dec!(5000.00))], GatewayStatus::Success);
  app.gateway.fail_next_verifications(&seeded.reference, 1);
  let body = charge_success_body(&seeded.reference);

  let err = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::GatewayUnavailable);

  let retried = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap();
  assert!(matches!(retried.outcome, Some(SettlementOutcome::Settled(_))));
}

#[tokio::test]
async fn test_malformed_payload_is_invalid_request() {
  let app = test_app();
  let body = b"{\"event\": 42}".to_vec();
  let err = process_webhook(&app.state, Bytes::from(body.clone()), Some(sign(&body)))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
