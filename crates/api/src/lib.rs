//! HTTP API server for checkout and order fulfillment.
//!
//! Provides the checkout and order placement endpoints over a
//! [`FulfillmentCoordinator`], with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use fulfillment::{AssetStore, FulfillmentCoordinator, PaymentGateway, ShippingCarrier};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C, A>
where
    S: OrderStore,
    C: ShippingCarrier,
    A: AssetStore,
{
    pub coordinator: FulfillmentCoordinator<S, C, A>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl<S, C, A> AppState<S, C, A>
where
    S: OrderStore,
    C: ShippingCarrier,
    A: AssetStore,
{
    pub fn new(
        coordinator: FulfillmentCoordinator<S, C, A>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            coordinator,
            payments,
        }
    }
}

/// Builds the CORS layer. `None` allows any origin.
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, header::InvalidHeaderValue> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(HeaderValue::from_str(origin)?),
        None => AllowOrigin::from(Any),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C, A>(
    state: Arc<AppState<S, C, A>>,
    metrics_handle: PrometheusHandle,
    cors: CorsLayer,
) -> Router
where
    S: OrderStore + 'static,
    C: ShippingCarrier + 'static,
    A: AssetStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route(
            "/payment-intents",
            post(routes::checkout::create_payment_intent::<S, C, A>),
        )
        .route("/orders", post(routes::orders::create::<S, C, A>))
        .with_state(state)
        .merge(metrics_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
