//! EasyPost shipments over its REST API.

use async_trait::async_trait;
use common::Money;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ServiceError;
use crate::services::http::read_json;
use crate::services::shipping::{
    CarrierAddress, Parcel, PurchasedShipment, Rate, ShipmentQuote, ShippingCarrier,
};

const SERVICE: &str = "easypost";

/// Default EasyPost API root.
pub const DEFAULT_BASE_URL: &str = "https://api.easypost.com/v2";

/// Shipping carrier backed by EasyPost.
///
/// Authenticates with the API key as the basic-auth user name.
#[derive(Debug, Clone)]
pub struct EasyPostClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CreateShipment<'a> {
    from_address: &'a CarrierAddress,
    to_address: &'a CarrierAddress,
    parcel: &'a Parcel,
}

#[derive(Debug, Deserialize)]
struct RateBody {
    id: String,
    carrier: String,
    service: String,
    rate: String,
    #[serde(default)]
    est_delivery_days: Option<u32>,
}

impl RateBody {
    fn into_rate(self) -> Result<Rate, ServiceError> {
        let rate = Money::parse_decimal(&self.rate).map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE,
            message: format!("rate {}: {e}", self.id),
        })?;
        Ok(Rate {
            id: self.id,
            carrier: self.carrier,
            service: self.service,
            rate,
            est_delivery_days: self.est_delivery_days,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ShipmentBody {
    id: String,
    #[serde(default)]
    rates: Vec<RateBody>,
}

#[derive(Debug, Deserialize)]
struct LabelBody {
    label_url: String,
}

#[derive(Debug, Deserialize)]
struct PurchasedBody {
    id: String,
    tracking_code: Option<String>,
    selected_rate: Option<RateBody>,
    postage_label: Option<LabelBody>,
}

impl PurchasedBody {
    fn into_purchase(self) -> Result<PurchasedShipment, ServiceError> {
        let missing = |field: &str| ServiceError::InvalidResponse {
            service: SERVICE,
            message: format!("bought shipment {} has no {field}", self.id),
        };
        let tracking_code = self.tracking_code.clone().ok_or_else(|| missing("tracking code"))?;
        let label_url = self
            .postage_label
            .as_ref()
            .map(|l| l.label_url.clone())
            .ok_or_else(|| missing("postage label"))?;
        let selected_rate = self
            .selected_rate
            .ok_or_else(|| missing("selected rate"))?
            .into_rate()?;
        Ok(PurchasedShipment {
            id: self.id,
            tracking_code,
            selected_rate,
            label_url,
        })
    }
}

impl EasyPostClient {
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

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .post(url)
            .basic_auth(&self.api_key, None::<&str>)
            .json(&body)
            .send()
            .await
            .map_err(|source| ServiceError::Http {
                service: SERVICE,
                source,
            })?;
        read_json(SERVICE, response).await
    }
}

#[async_trait]
impl ShippingCarrier for EasyPostClient {
    #[tracing::instrument(skip_all)]
    async fn create_shipment(
        &self,
        from: &CarrierAddress,
        to: &CarrierAddress,
        parcel: &Parcel,
    ) -> Result<ShipmentQuote, ServiceError> {
        let shipment = CreateShipment {
            from_address: from,
            to_address: to,
            parcel,
        };
        let body = json!({ "shipment": shipment });
        let shipment: ShipmentBody = self
            .post(format!("{}/shipments", self.base_url), body)
            .await?;

        let rates = shipment
            .rates
            .into_iter()
            .map(RateBody::into_rate)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(shipment_id = %shipment.id, rates = rates.len(), "shipment quoted");

        Ok(ShipmentQuote {
            id: shipment.id,
            rates,
        })
    }

    #[tracing::instrument(skip(self, rate), fields(rate_id = %rate.id))]
    async fn buy_shipment(
        &self,
        shipment_id: &str,
        rate: &Rate,
    ) -> Result<PurchasedShipment, ServiceError> {
        let body = json!({ "rate": { "id": rate.id } });
        let bought: PurchasedBody = self
            .post(
                format!("{}/shipments/{}/buy", self.base_url, shipment_id),
                body,
            )
            .await?;
        bought.into_purchase()
    }
}
