//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use domain::PaymentStatus;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::ServiceError;

const SERVICE: &str = "payment gateway";

/// A card payment intent as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Money,
    /// Handed to the browser to confirm the card. Only set on creation.
    pub client_secret: Option<String>,
}

/// Trait for card payment operations.
///
/// Intents are created for manual capture: the card is authorized at
/// checkout and captured only after the order has been fulfilled.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a USD card intent for `amount`, to be captured manually.
    async fn create_payment_intent(&self, amount: Money) -> Result<PaymentIntent, ServiceError>;

    /// Fetches an intent by id.
    async fn get_payment_intent(&self, id: &str) -> Result<PaymentIntent, ServiceError>;

    /// Captures an authorized intent.
    async fn capture_payment_intent(&self, id: &str) -> Result<PaymentIntent, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    intents: HashMap<String, PaymentIntent>,
    next_id: u32,
    captures: usize,
    fail_on_get: bool,
    fail_on_capture: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an intent that the purchaser has already authorized.
    pub async fn authorize(&self, id: impl Into<String>, amount: Money) {
        let id = id.into();
        self.state.write().await.intents.insert(
            id.clone(),
            PaymentIntent {
                id,
                status: PaymentStatus::RequiresCapture,
                amount,
                client_secret: None,
            },
        );
    }

    /// Registers an intent in an arbitrary status.
    pub async fn insert_intent(&self, intent: PaymentIntent) {
        self.state
            .write()
            .await
            .intents
            .insert(intent.id.clone(), intent);
    }

    /// Configures the gateway to fail on get_payment_intent calls.
    pub async fn set_fail_on_get(&self, fail: bool) {
        self.state.write().await.fail_on_get = fail;
    }

    /// Configures the gateway to fail on capture_payment_intent calls.
    pub async fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().await.fail_on_capture = fail;
    }

    /// Returns the number of successful captures.
    pub async fn capture_count(&self) -> usize {
        self.state.read().await.captures
    }

    /// Returns the current status of an intent.
    pub async fn status_of(&self, id: &str) -> Option<PaymentStatus> {
        self.state.read().await.intents.get(id).map(|i| i.status)
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::Api {
        service: SERVICE,
        status: 404,
        message: format!("No such payment_intent: '{id}'"),
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_intent(&self, amount: Money) -> Result<PaymentIntent, ServiceError> {
        let mut state = self.state.write().await;

        state.next_id += 1;
        let id = format!("pi_{:04}", state.next_id);
        let intent = PaymentIntent {
            id: id.clone(),
            status: PaymentStatus::RequiresPaymentMethod,
            amount,
            client_secret: Some(format!("{id}_secret")),
        };
        state.intents.insert(id, intent.clone());

        Ok(intent)
    }

    async fn get_payment_intent(&self, id: &str) -> Result<PaymentIntent, ServiceError> {
        let state = self.state.read().await;

        if state.fail_on_get {
            return Err(ServiceError::unavailable(SERVICE));
        }

        state.intents.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn capture_payment_intent(&self, id: &str) -> Result<PaymentIntent, ServiceError> {
        let mut state = self.state.write().await;

        if state.fail_on_capture {
            return Err(ServiceError::unavailable(SERVICE));
        }

        let intent = state.intents.get_mut(id).ok_or_else(|| not_found(id))?;
        if intent.status != PaymentStatus::RequiresCapture {
            return Err(ServiceError::Api {
                service: SERVICE,
                status: 400,
                message: format!(
                    "This PaymentIntent could not be captured because it has a status of {}",
                    intent.status
                ),
            });
        }
        intent.status = PaymentStatus::Succeeded;
        let captured = intent.clone();
        state.captures += 1;

        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_and_capture() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.authorize("pi_abc", Money::from_cents(1598)).await;

        let intent = gateway.get_payment_intent("pi_abc").await.unwrap();
        assert!(intent.status.is_authorized());

        let captured = gateway.capture_payment_intent("pi_abc").await.unwrap();
        assert_eq!(captured.status, PaymentStatus::Succeeded);
        assert_eq!(gateway.capture_count().await, 1);

        // A captured intent cannot be captured twice.
        let err = gateway.capture_payment_intent("pi_abc").await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_create_returns_client_secret() {
        let gateway = InMemoryPaymentGateway::new();

        let intent = gateway
            .create_payment_intent(Money::from_cents(599))
            .await
            .unwrap();
        assert_eq!(intent.id, "pi_0001");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_0001_secret"));
        assert_eq!(intent.status, PaymentStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn test_unknown_intent() {
        let gateway = InMemoryPaymentGateway::new();
        let err = gateway.get_payment_intent("pi_missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fail_on_capture() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.authorize("pi_abc", Money::from_cents(599)).await;
        gateway.set_fail_on_capture(true).await;

        assert!(gateway.capture_payment_intent("pi_abc").await.is_err());
        assert_eq!(
            gateway.status_of("pi_abc").await,
            Some(PaymentStatus::RequiresCapture)
        );
    }
}
