//! Shipping carrier trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use domain::ShippingAddress;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ServiceError;

const SERVICE: &str = "carrier";

/// An address as sent to the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CarrierAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub street1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl CarrierAddress {
    /// Builds a recipient address from a purchaser's shipping address.
    pub fn recipient(name: &str, address: &ShippingAddress) -> Self {
        Self {
            name: Some(name.to_string()),
            company: None,
            street1: address.line1.clone(),
            street2: address.line2.clone().filter(|l| !l.trim().is_empty()),
            city: address.city.clone(),
            state: address.state.clone(),
            zip: address.postal_code.clone(),
            country: address.country.clone(),
        }
    }
}

/// Package dimensions in inches and weight in ounces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
}

impl Parcel {
    /// The mailer every order ships in: 8 x 7 x 1.25 in, 15 oz.
    pub const fn standard() -> Self {
        Self {
            length: 8.0,
            width: 7.0,
            height: 1.25,
            weight: 15.0,
        }
    }
}

impl Default for Parcel {
    fn default() -> Self {
        Self::standard()
    }
}

/// One priced service option on a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rate {
    pub id: String,
    pub carrier: String,
    pub service: String,
    pub rate: Money,
    pub est_delivery_days: Option<u32>,
}

/// A created shipment and the rates the carrier offers for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentQuote {
    pub id: String,
    pub rates: Vec<Rate>,
}

/// A bought label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasedShipment {
    pub id: String,
    pub tracking_code: String,
    pub selected_rate: Rate,
    pub label_url: String,
}

/// Returns the cheapest rate. Ties go to the rate quoted first.
pub fn select_lowest_rate(rates: &[Rate]) -> Option<&Rate> {
    rates.iter().fold(None, |lowest, rate| match lowest {
        Some(current) if current.rate <= rate.rate => Some(current),
        _ => Some(rate),
    })
}

/// Trait for shipping label operations.
///
/// Buying a label charges the account; nothing here refunds one.
#[async_trait]
pub trait ShippingCarrier: Send + Sync {
    /// Creates a shipment and returns the rates quoted for it.
    async fn create_shipment(
        &self,
        from: &CarrierAddress,
        to: &CarrierAddress,
        parcel: &Parcel,
    ) -> Result<ShipmentQuote, ServiceError>;

    /// Picks the cheapest rate on a quote.
    async fn lowest_rate(&self, quote: &ShipmentQuote) -> Result<Rate, ServiceError> {
        select_lowest_rate(&quote.rates)
            .cloned()
            .ok_or_else(|| ServiceError::NoRates {
                shipment_id: quote.id.clone(),
            })
    }

    /// Buys the label for a quoted shipment at the given rate.
    async fn buy_shipment(
        &self,
        shipment_id: &str,
        rate: &Rate,
    ) -> Result<PurchasedShipment, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCarrierState {
    rates: Vec<(String, String, Money, Option<u32>)>,
    quotes: HashMap<String, ShipmentQuote>,
    purchases: Vec<PurchasedShipment>,
    recipients: Vec<CarrierAddress>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_buy: bool,
}

/// In-memory carrier for testing.
///
/// Quotes a single USPS rate of $5.00 unless configured otherwise.
#[derive(Debug, Clone)]
pub struct InMemoryCarrier {
    state: Arc<RwLock<InMemoryCarrierState>>,
}

impl Default for InMemoryCarrier {
    fn default() -> Self {
        let state = InMemoryCarrierState {
            rates: vec![(
                "USPS".to_string(),
                "GroundAdvantage".to_string(),
                Money::from_cents(500),
                Some(3),
            )],
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }
}

impl InMemoryCarrier {
    /// Creates a new in-memory carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rates quoted for every new shipment, as
    /// `(carrier, service, price)` in quote order.
    pub async fn set_rates(&self, rates: Vec<(&str, &str, Money)>) {
        self.state.write().await.rates = rates
            .into_iter()
            .map(|(carrier, service, price)| {
                (carrier.to_string(), service.to_string(), price, None)
            })
            .collect();
    }

    /// Configures the carrier to fail on create_shipment calls.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Configures the carrier to fail on buy_shipment calls.
    pub async fn set_fail_on_buy(&self, fail: bool) {
        self.state.write().await.fail_on_buy = fail;
    }

    /// Returns the number of shipments quoted.
    pub async fn quote_count(&self) -> usize {
        self.state.read().await.quotes.len()
    }

    /// Returns the number of labels bought.
    pub async fn purchase_count(&self) -> usize {
        self.state.read().await.purchases.len()
    }

    /// Returns every label bought, in order.
    pub async fn purchases(&self) -> Vec<PurchasedShipment> {
        self.state.read().await.purchases.clone()
    }

    /// Returns the recipient of every quoted shipment, in order.
    pub async fn recipients(&self) -> Vec<CarrierAddress> {
        self.state.read().await.recipients.clone()
    }
}

#[async_trait]
impl ShippingCarrier for InMemoryCarrier {
    async fn create_shipment(
        &self,
        _from: &CarrierAddress,
        to: &CarrierAddress,
        _parcel: &Parcel,
    ) -> Result<ShipmentQuote, ServiceError> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(ServiceError::unavailable(SERVICE));
        }

        state.next_id += 1;
        let n = state.next_id;
        let id = format!("shp_{n:04}");
        let rates = state
            .rates
            .iter()
            .enumerate()
            .map(|(i, (carrier, service, price, days))| Rate {
                id: format!("rate_{n:04}_{}", i + 1),
                carrier: carrier.clone(),
                service: service.clone(),
                rate: *price,
                est_delivery_days: *days,
            })
            .collect();

        let quote = ShipmentQuote { id, rates };
        state.quotes.insert(quote.id.clone(), quote.clone());
        state.recipients.push(to.clone());

        Ok(quote)
    }

    async fn buy_shipment(
        &self,
        shipment_id: &str,
        rate: &Rate,
    ) -> Result<PurchasedShipment, ServiceError> {
        let mut state = self.state.write().await;

        if state.fail_on_buy {
            return Err(ServiceError::unavailable(SERVICE));
        }

        let quote = state
            .quotes
            .get(shipment_id)
            .ok_or_else(|| ServiceError::Api {
                service: SERVICE,
                status: 404,
                message: format!("Shipment {shipment_id} not found"),
            })?;
        if !quote.rates.iter().any(|r| r.id == rate.id) {
            return Err(ServiceError::Api {
                service: SERVICE,
                status: 422,
                message: format!("Rate {} does not belong to shipment {shipment_id}", rate.id),
            });
        }

        let purchase = PurchasedShipment {
            id: shipment_id.to_string(),
            tracking_code: format!("9400{:018}", state.purchases.len() + 1),
            selected_rate: rate.clone(),
            label_url: format!("https://labels.example.com/{shipment_id}.png"),
        };
        state.purchases.push(purchase.clone());

        Ok(purchase)
    }
}
