//! Response handling shared by the HTTP adapters.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Decodes a success body as `T`, or turns an error status into
/// [`ServiceError::Api`] carrying the provider's message.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ServiceError::Http { service, source })?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        return Err(ServiceError::Api {
            service,
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ServiceError::InvalidResponse {
        service,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"type":"invalid_request_error","message":"No such payment_intent"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "No such payment_intent");
    }
}
