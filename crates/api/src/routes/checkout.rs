//! Checkout endpoint that prices a cart and opens a payment intent.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use domain::{ProductVariant, price_cart};
use fulfillment::{AssetStore, ShippingCarrier};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CartLine {
    #[serde(rename = "type")]
    pub variant: ProductVariant,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub cart: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_intent: String,
    pub client_secret: Option<String>,
}

/// POST /payment-intents: price the cart and create a manual-capture intent.
#[tracing::instrument(skip_all)]
pub async fn create_payment_intent<S, C, A>(
    State(state): State<Arc<AppState<S, C, A>>>,
    payload: Result<Json<PaymentIntentRequest>, JsonRejection>,
) -> Result<Json<PaymentIntentResponse>, ApiError>
where
    S: OrderStore + 'static,
    C: ShippingCarrier + 'static,
    A: AssetStore + 'static,
{
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(format!("Invalid cart: {e}")))?;

    let amount = price_cart(req.cart.iter().map(|line| (line.variant, line.quantity)))?;

    let intent = state
        .payments
        .create_payment_intent(amount)
        .await
        .map_err(ApiError::Payment)?;
    tracing::info!(payment_intent = %intent.id, %amount, "payment intent created");

    Ok(Json(PaymentIntentResponse {
        payment_intent: intent.id,
        client_secret: intent.client_secret,
    }))
}
