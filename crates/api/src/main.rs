//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::Config;
use fulfillment::{EasyPostClient, FulfillmentCoordinator, ObjectStoreAssetStore, StripeClient};
use order_store::PostgresOrderStore;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // 1. Initialize tracing, JSON lines in production
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let (json, plain) = if config.app_env.is_prod() {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
    tracing::debug!(?config, "configuration loaded");

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Connect the database and apply migrations
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = PostgresOrderStore::new(pool);
    store.run_migrations().await?;

    // 4. External services
    let carrier = EasyPostClient::new(config.easypost_key.as_str());
    let assets = ObjectStoreAssetStore::s3(&config.s3_bucket, &config.s3_region)?;
    let payments = Arc::new(StripeClient::new(config.stripe_key.as_str()));

    // 5. Build the application
    let coordinator = FulfillmentCoordinator::new(
        store,
        carrier,
        assets,
        config.shipping.clone(),
        config.assets.clone(),
    );
    let state = Arc::new(AppState::new(coordinator, payments));
    let cors = api::cors_layer(config.cors_origin.as_deref())?;
    let app = api::create_app(state, metrics_handle, cors);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, app_env = ?config.app_env, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
