//! External service traits, HTTP adapters and in-memory implementations.

pub mod assets;
pub mod easypost;
mod http;
pub mod payment;
pub mod shipping;
pub mod stripe;

pub use assets::{AssetStore, InMemoryAssetStore, ObjectStoreAssetStore};
pub use easypost::EasyPostClient;
pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentIntent};
pub use shipping::{
    CarrierAddress, InMemoryCarrier, Parcel, PurchasedShipment, Rate, ShipmentQuote,
    ShippingCarrier, select_lowest_rate,
};
pub use stripe::StripeClient;
