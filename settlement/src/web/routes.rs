// settlement/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{checkout_handlers, payment_handlers, wallet_handlers, webhook_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .route("/checkout", web::post().to(checkout_handlers::start_checkout_handler))
      .route(
        "/payments/verify/{reference}",
        web::get().to(payment_handlers::verify_payment_handler),
      )
      .route("/webhooks/gateway", web::post().to(webhook_handlers::gateway_webhook_handler))
      .service(
        web::scope("/wallet")
          .route("/balance", web::get().to(wallet_handlers::wallet_balance_handler))
          .route("/transactions", web::get().to(wallet_handlers::wallet_transactions_handler)),
      ),
  );
}
