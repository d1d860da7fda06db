// settlement/src/main.rs

use std::sync::Arc;

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use marketplace_settlement::config::{AppConfig, GatewayMode};
use marketplace_settlement::errors::AppError;
use marketplace_settlement::pipelines::reconciliation::spawn_reconciliation;
use marketplace_settlement::services::gateway::{GatewayClient, HttpGatewayClient};
use marketplace_settlement::services::gateway_mock::MockGateway;
use marketplace_settlement::state::{AppState, Backends};
use marketplace_settlement::store::{MemoryStore, PgStore};
use marketplace_settlement::{telemetry, web};

async fn build_backends(config: &AppConfig) -> Result<Backends, AppError> {
  let gateway: Arc<dyn GatewayClient> = match config.gateway_mode {
    GatewayMode::Http => Arc::new(HttpGatewayClient::new(
      &config.gateway_base_url,
      &config.gateway_secret_key,
      config.gateway_timeout,
    )?),
    GatewayMode::Mock => {
      tracing::warn!("GATEWAY_MODE=mock: every payment is approved immediately.");
      Arc::new(MockGateway::auto_approving())
    }
  };

  match &config.database_url {
    Some(url) => {
      let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;
      sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Config(format!("database migration failed: {}", e)))?;
      tracing::info!("Connected to the database and applied migrations.");
      let store = Arc::new(PgStore::new(pool));
      Ok(Backends {
        orders: store.clone(),
        ledger: store.clone(),
        carts: store.clone(),
        notifications: store,
        gateway,
      })
    }
    None => {
      tracing::warn!("DATABASE_URL not set: using the in-memory store. Data is lost on restart.");
      let store = Arc::new(MemoryStore::new());
      Ok(Backends {
        orders: store.clone(),
        ledger: store.clone(),
        carts: store.clone(),
        notifications: store,
        gateway,
      })
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      eprintln!("Failed to load application configuration: {}", e);
      std::process::exit(1);
    }
  };
  telemetry::init_tracing(app_config.log_format);
  tracing::info!("Starting settlement server...");

  let backends = match build_backends(&app_config).await {
    Ok(backends) => backends,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialize backends.");
      std::process::exit(1);
    }
  };
  let app_state = AppState::new(app_config.clone(), backends);

  let reconciler = (!app_config.reconcile_interval.is_zero()).then(|| {
    tracing::info!(interval = ?app_config.reconcile_interval, "Reconciliation sweep enabled.");
    spawn_reconciliation(app_state.clone(), app_config.reconcile_interval)
  });

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  let result = HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await;

  if let Some(handle) = reconciler {
    handle.abort();
  }
  result
}
