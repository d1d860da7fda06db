// settlement/src/pipelines/common_steps.rs

use stepflow::{ContextData, PipelineControl};
use tracing::{info, instrument};

use crate::errors::Result as AppResult;
use crate::models::money::display_amount;
use crate::models::NotificationKind;
use crate::pipelines::contexts::SettlementCtxData;
use crate::services::notifier::NotificationData;

/// Tells the buyer their order is confirmed and each credited creator about their share.
///
/// Runs as a best-effort step: `Notifier` already swallows delivery failures, and
/// the step itself never returns an error.
#[instrument(name = "common_step::notify_settlement_parties", skip(ctx_data))]
pub async fn notify_settlement_parties(ctx_data: ContextData<SettlementCtxData>) -> AppResult<PipelineControl> {
  let (notifier, order, credits) = ctx_data.view(|d| (d.app_state.notifier.clone(), d.order.clone(), d.credits.clone()));
  let Some(order) = order else {
    return Ok(PipelineControl::Continue);
  };

  let mut delivered = 0usize;
  let buyer_message = format!(
    "Your order {} for {} has been confirmed.",
    order.order_number,
    display_amount(order.total_amount, &order.currency)
  );
  if notifier
    .notify(
      order.buyer_id,
      NotificationKind::OrderConfirmed,
      "Order confirmed",
      &buyer_message,
      NotificationData {
        link: Some(format!("/orders/{}", order.id)),
        order_id: Some(order.id),
        artwork_id: None,
      },
    )
    .await
  {
    delivered += 1;
  }

  // One per distinct creator; `credits` is already grouped and holds no zero shares.
  for credit in &credits {
    let message = format!(
      "Order {} earned you {}.",
      order.order_number,
      display_amount(credit.amount, &order.currency)
    );
    let sent = notifier
      .notify(
        credit.creator_id,
        NotificationKind::SaleMade,
        "You made a sale",
        &message,
        NotificationData {
          link: Some("/wallet".to_string()),
          order_id: Some(order.id),
          artwork_id: None,
        },
      )
      .await;
    if sent {
      delivered += 1;
    }
  }

  info!(order_id = %order.id, delivered, attempted = credits.len() + 1, "Settlement notifications dispatched.");
  ctx_data.update(|d| d.notifications_sent = delivered);
  Ok(PipelineControl::Continue)
}
