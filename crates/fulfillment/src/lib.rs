//! Order fulfillment for the print storefront.
//!
//! Turns an authorized checkout into a committed order:
//! 1. Insert the order row
//! 2. Buy the cheapest shipping label
//! 3. Insert the shipping and print job rows
//! 4. Upload every cart file to object storage and record it
//!
//! All database writes share one transaction. A failure rolls it back but
//! does not undo the label purchase or the uploads.

pub mod coordinator;
pub mod error;
pub mod label;
pub mod migration;
pub mod order_fulfillment;
pub mod services;

pub use coordinator::FulfillmentCoordinator;
pub use error::{ErrorKind, FulfillmentError, Result, ServiceError};
pub use label::{LabelPurchase, LabelPurchaser, ShippingConfig};
pub use migration::{AssetLocations, AssetMigrator, ResolvedAsset};
pub use services::{
    AssetStore, CarrierAddress, EasyPostClient, InMemoryAssetStore, InMemoryCarrier,
    InMemoryPaymentGateway, ObjectStoreAssetStore, Parcel, PaymentGateway, PaymentIntent,
    PurchasedShipment, Rate, ShipmentQuote, ShippingCarrier, StripeClient, select_lowest_rate,
};
