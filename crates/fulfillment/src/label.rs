//! Shipping label purchase for an order.

use domain::{OrderRequest, ShippingSummary};

use crate::error::{FulfillmentError, Result};
use crate::services::shipping::{CarrierAddress, Parcel, PurchasedShipment, ShippingCarrier};

/// Where labels ship from and what they ship in.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingConfig {
    pub sender: CarrierAddress,
    pub parcel: Parcel,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            sender: CarrierAddress {
                name: None,
                company: Some("Fairway Ink".to_string()),
                street1: "6729 Old Stagecoach Road".to_string(),
                street2: None,
                city: "Frazeysburg".to_string(),
                state: "OH".to_string(),
                zip: "43822".to_string(),
                country: "US".to_string(),
            },
            parcel: Parcel::standard(),
        }
    }
}

/// A bought label and the summary handed back to the caller.
#[derive(Debug, Clone)]
pub struct LabelPurchase {
    pub shipment: PurchasedShipment,
    pub summary: ShippingSummary,
}

/// Quotes, selects and buys the cheapest label for an order.
#[derive(Debug, Clone)]
pub struct LabelPurchaser<C> {
    carrier: C,
    config: ShippingConfig,
}

impl<C: ShippingCarrier> LabelPurchaser<C> {
    pub fn new(carrier: C, config: ShippingConfig) -> Self {
        Self { carrier, config }
    }

    pub fn carrier(&self) -> &C {
        &self.carrier
    }

    /// Buys a label from the configured sender to the purchaser.
    ///
    /// The label is bought as soon as this returns `Ok`; the caller owns
    /// the consequences if the order is later rolled back.
    #[tracing::instrument(skip_all, fields(session_id = %request.session_id))]
    pub async fn purchase(&self, request: &OrderRequest) -> Result<LabelPurchase> {
        let to = CarrierAddress::recipient(&request.purchaser_name, &request.shipping_address);

        let quote = self
            .carrier
            .create_shipment(&self.config.sender, &to, &self.config.parcel)
            .await
            .map_err(FulfillmentError::QuoteShipment)?;

        let rate = self
            .carrier
            .lowest_rate(&quote)
            .await
            .map_err(FulfillmentError::SelectRate)?;
        tracing::debug!(
            shipment_id = %quote.id,
            carrier = %rate.carrier,
            service = %rate.service,
            rate = %rate.rate,
            "lowest rate selected"
        );

        let shipment = self
            .carrier
            .buy_shipment(&quote.id, &rate)
            .await
            .map_err(FulfillmentError::PurchaseLabel)?;
        metrics::counter!("fulfillment_labels_purchased_total").increment(1);
        tracing::info!(
            shipment_id = %shipment.id,
            tracking_number = %shipment.tracking_code,
            "shipping label purchased"
        );

        let summary = ShippingSummary {
            tracking_number: shipment.tracking_code.clone(),
            carrier: shipment.selected_rate.carrier.clone(),
            service: shipment.selected_rate.service.clone(),
            estimated_delivery_days: shipment.selected_rate.est_delivery_days,
            to_name: request.purchaser_name.clone(),
            to_address: request.shipping_address.clone(),
        };

        Ok(LabelPurchase { shipment, summary })
    }
}
