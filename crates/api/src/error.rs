//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use fulfillment::{ErrorKind, FulfillmentError, ServiceError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Request validation or pricing error.
    Domain(DomainError),
    /// The payment intent exists but is not authorized.
    PaymentNotAuthorized(String),
    /// The payment gateway failed or rejected a call.
    Payment(ServiceError),
    /// An order run failed.
    Fulfillment(FulfillmentError),
    /// The order was saved but the payment could not be captured.
    Capture(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::PaymentNotAuthorized(status) => (
                StatusCode::BAD_REQUEST,
                format!("Payment is not authorized (status: {status})"),
            ),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Capture(err) => {
                tracing::error!(error = %err, "payment capture failed after order was saved");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to capture payment: {err}"),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn payment_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::InvalidId { .. } => {
            (StatusCode::BAD_REQUEST, format!("Payment error: {err}"))
        }
        ServiceError::Api { status, .. } if (400..500).contains(status) => {
            (StatusCode::BAD_REQUEST, format!("Payment error: {err}"))
        }
        _ => (StatusCode::BAD_GATEWAY, format!("Payment error: {err}")),
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::External => StatusCode::BAD_GATEWAY,
        ErrorKind::Infrastructure | ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        format!("Unable to process order at {}: {err}", err.step()),
    )
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}
