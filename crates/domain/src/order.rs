//! Order request, persisted order and the shipping summary returned to callers.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PrintJobId, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Destination address supplied by the purchaser at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// State of a payment intent as reported by the card processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    /// Authorized and waiting to be captured.
    RequiresCapture,
    Canceled,
    Succeeded,
}

impl PaymentStatus {
    /// Returns the status string used by the processor and stored on the order.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Processing => "processing",
            PaymentStatus::RequiresCapture => "requires_capture",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Succeeded => "succeeded",
        }
    }

    /// Returns true if the payment is authorized but not yet captured.
    pub fn is_authorized(&self) -> bool {
        matches!(self, PaymentStatus::RequiresCapture)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "requires_payment_method" => PaymentStatus::RequiresPaymentMethod,
            "requires_confirmation" => PaymentStatus::RequiresConfirmation,
            "requires_action" => PaymentStatus::RequiresAction,
            "processing" => PaymentStatus::Processing,
            "requires_capture" => PaymentStatus::RequiresCapture,
            "canceled" => PaymentStatus::Canceled,
            "succeeded" => PaymentStatus::Succeeded,
            other => return Err(DomainError::UnknownPaymentStatus(other.to_string())),
        })
    }
}

/// Everything needed to fulfill one checkout.
///
/// `amount` and `payment_status` are copied from the payment intent the
/// caller already verified; the order records them as they were at
/// authorization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub payment_reference: String,
    pub session_id: SessionId,
    pub amount: Money,
    pub payment_status: PaymentStatus,
    pub purchaser_name: String,
    pub purchaser_email: String,
    pub shipping_address: ShippingAddress,
}

impl OrderRequest {
    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("payment_reference", self.payment_reference.as_str()),
            ("session_id", self.session_id.as_str()),
            ("purchaser_name", self.purchaser_name.as_str()),
            ("purchaser_email", self.purchaser_email.as_str()),
            ("address.line1", self.shipping_address.line1.as_str()),
            ("address.city", self.shipping_address.city.as_str()),
            ("address.state", self.shipping_address.state.as_str()),
            ("address.postal_code", self.shipping_address.postal_code.as_str()),
            ("address.country", self.shipping_address.country.as_str()),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Row written by `insert_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub payment_reference: String,
    pub session_id: SessionId,
    pub amount: Money,
    pub payment_status: PaymentStatus,
    pub purchaser_name: String,
    pub purchaser_email: String,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Builds the order row for a request, stamped with `created_at`.
    pub fn from_request(request: &OrderRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            payment_reference: request.payment_reference.clone(),
            session_id: request.session_id.clone(),
            amount: request.amount,
            payment_status: request.payment_status,
            purchaser_name: request.purchaser_name.clone(),
            purchaser_email: request.purchaser_email.clone(),
            shipping_address: request.shipping_address.clone(),
            created_at,
        }
    }
}

/// Caller-facing description of the purchased shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSummary {
    pub tracking_number: String,
    pub carrier: String,
    pub service: String,
    pub estimated_delivery_days: Option<u32>,
    pub to_name: String,
    pub to_address: ShippingAddress,
}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub payment_reference: String,
    pub session_id: SessionId,
    pub amount: Money,
    pub payment_status: PaymentStatus,
    pub purchaser_name: String,
    pub purchaser_email: String,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    /// Set on orders returned from a fulfillment run.
    pub print_job_id: Option<PrintJobId>,
    /// Set on orders returned from a fulfillment run.
    pub shipping: Option<ShippingSummary>,
}

impl Order {
    /// Builds an order from its stored row.
    pub fn from_new(id: OrderId, row: NewOrder) -> Self {
        Self {
            id,
            payment_reference: row.payment_reference,
            session_id: row.session_id,
            amount: row.amount,
            payment_status: row.payment_status,
            purchaser_name: row.purchaser_name,
            purchaser_email: row.purchaser_email,
            shipping_address: row.shipping_address,
            created_at: row.created_at,
            print_job_id: None,
            shipping: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OrderRequest {
        OrderRequest {
            payment_reference: "pi_123".to_string(),
            session_id: SessionId::new("ssid123"),
            amount: Money::from_cents(1000),
            payment_status: PaymentStatus::RequiresCapture,
            purchaser_name: "John Doe".to_string(),
            purchaser_email: "test@example.com".to_string(),
            shipping_address: ShippingAddress {
                line1: "123 Main St".to_string(),
                line2: None,
                city: "Boston".to_string(),
                state: "MA".to_string(),
                postal_code: "02108".to_string(),
                country: "US".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_named() {
        let mut req = request();
        req.purchaser_email = "  ".to_string();
        assert_eq!(
            req.validate(),
            Err(DomainError::MissingField("purchaser_email"))
        );

        let mut req = request();
        req.shipping_address.postal_code.clear();
        assert_eq!(
            req.validate(),
            Err(DomainError::MissingField("address.postal_code"))
        );
    }

    #[test]
    fn test_line2_is_optional() {
        let mut req = request();
        req.shipping_address.line2 = Some("Apt 4".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_payment_status_roundtrip() {
        for status in [
            PaymentStatus::RequiresCapture,
            PaymentStatus::Succeeded,
            PaymentStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert!(PaymentStatus::RequiresCapture.is_authorized());
        assert!(!PaymentStatus::Succeeded.is_authorized());
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_order_from_new_has_no_fulfillment_details() {
        let created_at = Utc::now();
        let row = NewOrder::from_request(&request(), created_at);
        let order = Order::from_new(OrderId::new(9), row);
        assert_eq!(order.id.as_i64(), 9);
        assert_eq!(order.created_at, created_at);
        assert_eq!(order.amount.cents(), 1000);
        assert!(order.shipping.is_none());
        assert!(order.print_job_id.is_none());
    }
}
