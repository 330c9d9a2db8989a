//! Domain model for the order fulfillment backend.
//!
//! This crate holds the plain data carried through an order run:
//! - cart items and product variants, with variant pricing
//! - the caller-supplied order request and its validation
//! - the persisted order, shipping, print job and asset file records
//! - path-element safety rules for session ids and file names

pub mod cart;
pub mod error;
pub mod order;
pub mod path;
pub mod records;

pub use cart::{CartItem, ProductVariant, price_cart};
pub use common::{Money, OrderId, PrintJobId, SessionId};
pub use error::DomainError;
pub use order::{NewOrder, Order, OrderRequest, PaymentStatus, ShippingAddress, ShippingSummary};
pub use path::{file_name_from_reference, is_safe_path_element};
pub use records::{AssetFileRecord, PrintJob, PrintJobStatus, ShippingRecord};
