//! Order placement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use domain::{DomainError, Order, OrderRequest, ShippingAddress};
use fulfillment::{AssetStore, ShippingCarrier};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlaceOrderRequest {
    pub intent_id: String,
    pub browser_ssid: String,
    pub name: String,
    pub email: String,
    pub address: ShippingAddress,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub order: Order,
}

// -- Handlers --

/// POST /orders: fulfill an authorized payment intent, then capture it.
///
/// The intent must be in `requires_capture`. Capture happens only after the
/// order is committed; a capture failure leaves a saved, uncaptured order.
#[tracing::instrument(skip_all, fields(intent_id = tracing::field::Empty))]
pub async fn create<S, C, A>(
    State(state): State<Arc<AppState<S, C, A>>>,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<PlaceOrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    C: ShippingCarrier + 'static,
    A: AssetStore + 'static,
{
    let Json(req) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?;
    if req.intent_id.trim().is_empty() {
        return Err(DomainError::MissingField("intent_id").into());
    }
    tracing::Span::current().record("intent_id", req.intent_id.as_str());

    let intent = state
        .payments
        .get_payment_intent(&req.intent_id)
        .await
        .map_err(ApiError::Payment)?;
    if !intent.status.is_authorized() {
        tracing::warn!(status = %intent.status, "payment not authorized");
        return Err(ApiError::PaymentNotAuthorized(intent.status.to_string()));
    }

    let request = OrderRequest {
        payment_reference: intent.id,
        session_id: req.browser_ssid.into(),
        amount: intent.amount,
        payment_status: intent.status,
        purchaser_name: req.name,
        purchaser_email: req.email,
        shipping_address: req.address,
    };
    request.validate()?;

    let mut order = state.coordinator.process_order(&request).await?;

    let captured = state
        .payments
        .capture_payment_intent(&request.payment_reference)
        .await
        .map_err(ApiError::Capture)?;
    order.payment_status = captured.status;
    tracing::info!(order_id = %order.id, payment_status = %order.payment_status, "payment captured");

    Ok(Json(PlaceOrderResponse {
        success: true,
        order,
    }))
}
