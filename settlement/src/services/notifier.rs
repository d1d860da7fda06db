// settlement/src/services/notifier.rs

use chrono::Utc;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::models::{Notification, NotificationKind};
use crate::store::NotificationSink;

/// Links a notification back to the order or artwork it is about.
#[derive(Debug, Clone, Default)]
pub struct NotificationData {
  pub link: Option<String>,
  pub order_id: Option<Uuid>,
  pub artwork_id: Option<Uuid>,
}

/// Best-effort delivery in front of a `NotificationSink`.
///
/// `notify` never fails: sink errors are logged and dropped, so settlement
/// results do not depend on whether notifications went out.
#[derive(Clone)]
pub struct Notifier {
  sink: Arc<dyn NotificationSink>,
}

impl Notifier {
  pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
    Self { sink }
  }

  /// Returns whether the sink accepted the notification.
  #[instrument(name = "notifier::notify", skip(self, title, message, data), fields(kind = kind.as_str()))]
  pub async fn notify(
    &self,
    recipient_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: NotificationData,
  ) -> bool {
    let notification = Notification {
      id: Uuid::new_v4(),
      recipient_id,
      kind: kind.as_str().to_string(),
      title: title.to_string(),
      message: message.to_string(),
      link: data.link,
      order_id: data.order_id,
      artwork_id: data.artwork_id,
      created_at: Utc::now(),
    };
    match self.sink.deliver(&notification).await {
      Ok(()) => true,
      Err(e) => {
        warn!(%recipient_id, error = %e, "Notification delivery failed; dropping it.");
        false
      }
    }
  }
}
