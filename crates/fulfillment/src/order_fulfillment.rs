//! Order fulfillment step names.
//!
//! Used as the `step` field in logs, as the `step` label on failure
//! metrics, and by [`FulfillmentError::step`](crate::FulfillmentError::step).

/// Step name: Open the database transaction.
pub const STEP_BEGIN_TRANSACTION: &str = "begin_transaction";

/// Step name: Insert the order row.
pub const STEP_INSERT_ORDER: &str = "insert_order";

/// Step name: Quote a shipment with the carrier.
pub const STEP_QUOTE_SHIPMENT: &str = "quote_shipment";

/// Step name: Pick the cheapest quoted rate.
pub const STEP_SELECT_RATE: &str = "select_rate";

/// Step name: Buy the shipping label.
pub const STEP_PURCHASE_LABEL: &str = "purchase_label";

/// Step name: Insert the shipping row.
pub const STEP_INSERT_SHIPPING: &str = "insert_shipping";

/// Step name: Insert the print job row.
pub const STEP_INSERT_PRINT_JOB: &str = "insert_print_job";

/// Step name: Read the session's cart.
pub const STEP_READ_CART: &str = "read_cart";

/// Step name: Map cart items to local files and object keys.
pub const STEP_RESOLVE_ASSETS: &str = "resolve_assets";

/// Step name: Read a local model file.
pub const STEP_READ_ASSET: &str = "read_asset";

/// Step name: Upload a model file to object storage.
pub const STEP_UPLOAD_ASSET: &str = "upload_asset";

/// Step name: Insert an asset file row.
pub const STEP_INSERT_ASSET_FILE: &str = "insert_asset_file";

/// Step name: Commit the transaction.
pub const STEP_COMMIT: &str = "commit";
