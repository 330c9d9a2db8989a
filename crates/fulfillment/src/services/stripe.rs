//! Stripe payment intents over its REST API.

use async_trait::async_trait;
use common::Money;
use domain::PaymentStatus;
use serde::Deserialize;

use crate::error::ServiceError;
use crate::services::http::read_json;
use crate::services::payment::{PaymentGateway, PaymentIntent};

const SERVICE: &str = "stripe";

/// Default Stripe API root.
pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";

/// Payment gateway backed by Stripe.
///
/// Requests are form-encoded and authenticated with the secret key as a
/// bearer token.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    status: String,
    amount: i64,
    client_secret: Option<String>,
}

impl IntentBody {
    fn into_intent(self) -> Result<PaymentIntent, ServiceError> {
        let status = self
            .status
            .parse::<PaymentStatus>()
            .map_err(|e| ServiceError::InvalidResponse {
                service: SERVICE,
                message: e.to_string(),
            })?;
        Ok(PaymentIntent {
            id: self.id,
            status,
            amount: Money::from_cents(self.amount),
            client_secret: self.client_secret,
        })
    }
}

impl StripeClient {
    /// Creates a client for the live API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builds the URL of one intent. Stripe ids are alphanumeric with
    /// underscores; anything else is refused before a request is made.
    fn intent_url(&self, id: &str) -> Result<String, ServiceError> {
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ServiceError::InvalidId {
                service: SERVICE,
                id: id.to_string(),
            });
        }
        Ok(format!("{}/payment_intents/{}", self.base_url, id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<PaymentIntent, ServiceError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| ServiceError::Http {
                service: SERVICE,
                source,
            })?;
        read_json::<IntentBody>(SERVICE, response)
            .await?
            .into_intent()
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[tracing::instrument(skip(self))]
    async fn create_payment_intent(&self, amount: Money) -> Result<PaymentIntent, ServiceError> {
        let amount = amount.cents().to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", "usd"),
            ("payment_method_types[]", "card"),
            ("capture_method", "manual"),
        ];
        let url = format!("{}/payment_intents", self.base_url);
        self.send(self.http.post(url).form(&form)).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_payment_intent(&self, id: &str) -> Result<PaymentIntent, ServiceError> {
        self.send(self.http.get(self.intent_url(id)?)).await
    }

    #[tracing::instrument(skip(self))]
    async fn capture_payment_intent(&self, id: &str) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}/capture", self.intent_url(id)?);
        self.send(self.http.post(url)).await
    }
}
