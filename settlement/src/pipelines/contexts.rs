// settlement/src/pipelines/contexts.rs

//! Context data carried through each pipeline run.

use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Cart, CartLine, Order, OrderLineItem, OrderStatus, PaymentStatus};
use crate::services::gateway::{GatewayStatus, InitializedTransaction, VerifiedTransaction};
use crate::state::AppState;

/// What caused a settlement attempt. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementTrigger {
  Callback,
  Webhook,
  Reconciliation,
}

/// One creator's share of an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatorCredit {
  pub creator_id: Uuid,
  pub amount: Decimal,
  /// `false` when an entry for this creator and order already existed.
  pub newly_recorded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReceipt {
  pub order_id: Uuid,
  pub order_number: String,
  pub reference: String,
  pub amount: Decimal,
  pub currency: String,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub settled_at: DateTime<Utc>,
  pub credits: Vec<CreatorCredit>,
}

impl SettlementReceipt {
  /// Reports the stored order total, so every call for the same order shows the same amount.
  pub fn for_order(order: &Order, reference: &str, credits: Vec<CreatorCredit>) -> Self {
    Self {
      order_id: order.id,
      order_number: order.order_number.clone(),
      reference: reference.to_string(),
      amount: order.total_amount,
      currency: order.currency.clone(),
      payment_status: order.payment_status,
      order_status: order.order_status,
      settled_at: order.updated_at,
      credits,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnpaidNotice {
  pub reference: String,
  pub gateway_status: GatewayStatus,
  pub order_id: Option<Uuid>,
  /// Whether this run moved the order to `failed/cancelled`.
  pub order_cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SettlementOutcome {
  /// This call performed the settlement.
  Settled(SettlementReceipt),
  /// A previous or concurrent call already settled the order.
  AlreadyProcessed(SettlementReceipt),
  /// The gateway does not report the payment as successful.
  NotPaid(UnpaidNotice),
}

impl SettlementOutcome {
  pub fn receipt(&self) -> Option<&SettlementReceipt> {
    match self {
      SettlementOutcome::Settled(r) | SettlementOutcome::AlreadyProcessed(r) => Some(r),
      SettlementOutcome::NotPaid(_) => None,
    }
  }

  pub fn is_already_processed(&self) -> bool {
    matches!(self, SettlementOutcome::AlreadyProcessed(_))
  }
}

#[derive(Clone)]
pub struct SettlementCtxData {
  pub app_state: AppState,
  pub reference: String,
  pub trigger: SettlementTrigger,

  pub verification: Option<VerifiedTransaction>,
  pub order: Option<Order>,
  pub line_items: Vec<OrderLineItem>,
  pub credits: Vec<CreatorCredit>,
  pub cart_completed: bool,
  pub notifications_sent: usize,
  pub outcome: Option<SettlementOutcome>,
}

impl SettlementCtxData {
  pub fn new(app_state: AppState, reference: &str, trigger: SettlementTrigger) -> Self {
    Self {
      app_state,
      reference: reference.to_string(),
      trigger,
      verification: None,
      order: None,
      line_items: Vec::new(),
      credits: Vec::new(),
      cart_completed: false,
      notifications_sent: 0,
      outcome: None,
    }
  }

  /// Cart correlation: gateway metadata first, then the order row.
  pub fn cart_id(&self) -> Option<Uuid> {
    let from_metadata = self
      .verification
      .as_ref()
      .and_then(|v| v.metadata_str("cart_id"))
      .and_then(|raw| Uuid::parse_str(raw).ok());
    from_metadata.or_else(|| self.order.as_ref().and_then(|o| o.cart_id))
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
  pub order_id: Uuid,
  pub order_number: String,
  pub total_amount: Decimal,
  pub currency: String,
  pub reference: String,
  pub authorization_url: String,
  pub access_code: String,
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub buyer_id: Uuid,
  pub buyer_email: String,

  pub cart: Option<Cart>,
  pub cart_lines: Vec<CartLine>,
  pub order: Option<Order>,
  pub line_items: Vec<OrderLineItem>,
  pub reference: Option<String>,
  pub transaction: Option<InitializedTransaction>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, buyer_id: Uuid, buyer_email: &str) -> Self {
    Self {
      app_state,
      buyer_id,
      buyer_email: buyer_email.to_string(),
      cart: None,
      cart_lines: Vec::new(),
      order: None,
      line_items: Vec::new(),
      reference: None,
      transaction: None,
    }
  }

  pub fn session(&self) -> Option<CheckoutSession> {
    let order = self.order.as_ref()?;
    let transaction = self.transaction.as_ref()?;
    Some(CheckoutSession {
      order_id: order.id,
      order_number: order.order_number.clone(),
      total_amount: order.total_amount,
      currency: order.currency.clone(),
      reference: transaction.reference.clone(),
      authorization_url: transaction.authorization_url.clone(),
      access_code: transaction.access_code.clone(),
    })
  }
}

/// The subset of a gateway webhook body the service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
  pub event: String,
  pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
  pub reference: String,
}

pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";

#[derive(Clone)]
pub struct WebhookCtxData {
  pub app_state: AppState,
  pub raw_body: Bytes,
  pub signature: Option<String>,

  pub event: Option<GatewayEvent>,
  pub ignored: bool,
  pub outcome: Option<SettlementOutcome>,
  pub acknowledged: bool,
}

impl WebhookCtxData {
  pub fn new(app_state: AppState, raw_body: Bytes, signature: Option<String>) -> Self {
    Self {
      app_state,
      raw_body,
      signature,
      event: None,
      ignored: false,
      outcome: None,
      acknowledged: false,
    }
  }
}

impl std::fmt::Debug for WebhookCtxData {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebhookCtxData")
      .field("raw_body", &self.raw_body)
      .field("signature", &self.signature)
      .field("event", &self.event)
      .field("ignored", &self.ignored)
      .field("outcome", &self.outcome)
      .field("acknowledged", &self.acknowledged)
      .finish_non_exhaustive()
  }
}
