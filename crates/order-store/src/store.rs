use async_trait::async_trait;
use common::{OrderId, PrintJobId, SessionId};
use domain::{AssetFileRecord, CartItem, NewOrder, Order, PrintJob, ShippingRecord};

use crate::Result;

/// A relational store that hands out transaction handles.
///
/// The read methods see committed data only.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The transaction handle type.
    type Transaction: OrderTransaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Loads a committed order without its fulfillment details.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads the committed shipping record of an order.
    async fn get_shipping_record(&self, order_id: OrderId) -> Result<Option<ShippingRecord>>;

    /// Lists the committed print jobs of an order.
    async fn list_print_jobs(&self, order_id: OrderId) -> Result<Vec<PrintJob>>;

    /// Lists the committed asset file rows of a print job.
    async fn list_asset_files(&self, print_job_id: PrintJobId) -> Result<Vec<AssetFileRecord>>;

    /// Counts committed orders.
    async fn count_orders(&self) -> Result<u64>;
}

/// Writes scoped to one open transaction.
///
/// Each method runs a single statement, does not retry, and reports the
/// store's error labelled with its [`Operation`](crate::Operation).
/// Dropping the handle without committing discards every write.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Inserts the order row and returns its generated id.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId>;

    /// Inserts the shipping row of an order.
    async fn insert_shipping_record(&mut self, record: &ShippingRecord) -> Result<()>;

    /// Inserts a queued print job for an order and returns its generated id.
    async fn insert_print_job(&mut self, order_id: OrderId) -> Result<PrintJobId>;

    /// Reads a session's cart in insertion order.
    async fn list_cart_items(&mut self, session_id: &SessionId) -> Result<Vec<CartItem>>;

    /// Inserts the row of a migrated model file.
    async fn insert_asset_file(&mut self, record: &AssetFileRecord) -> Result<()>;

    /// Commits every write made through this handle.
    async fn commit(self) -> Result<()>;

    /// Discards every write made through this handle.
    async fn rollback(self) -> Result<()>;
}
