use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PrintJobId, SessionId};
use domain::{
    AssetFileRecord, CartItem, NewOrder, Order, PrintJob, PrintJobStatus, ShippingRecord,
};
use tokio::sync::RwLock;

use crate::{
    Operation, Result, StoreError,
    store::{OrderStore, OrderTransaction},
};

#[derive(Default)]
struct MemoryState {
    carts: HashMap<SessionId, Vec<CartItem>>,
    orders: BTreeMap<OrderId, Order>,
    shipping: BTreeMap<OrderId, ShippingRecord>,
    print_jobs: BTreeMap<PrintJobId, PrintJob>,
    asset_files: Vec<AssetFileRecord>,
    next_order_id: i64,
    next_print_job_id: i64,
    failures: HashSet<Operation>,
    begun: usize,
    committed: usize,
    rolled_back: usize,
}

impl MemoryState {
    fn check(&self, operation: Operation) -> Result<()> {
        if self.failures.contains(&operation) {
            return Err(StoreError::Unavailable {
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory order store for testing.
///
/// Writes are staged on the transaction handle and become visible only on
/// commit. Generated ids are drawn from shared sequences and are not reused
/// after a rollback, as with database sequences.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a cart item, as the cart service would.
    pub async fn add_cart_item(&self, item: CartItem) {
        self.state
            .write()
            .await
            .carts
            .entry(item.session_id.clone())
            .or_default()
            .push(item);
    }

    /// Makes every future call of `operation` fail until cleared.
    pub async fn set_fail_on(&self, operation: Operation, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.failures.insert(operation);
        } else {
            state.failures.remove(&operation);
        }
    }

    /// Returns all committed orders in id order.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.read().await.orders.values().cloned().collect()
    }

    /// Returns the number of committed shipping records.
    pub async fn shipping_count(&self) -> usize {
        self.state.read().await.shipping.len()
    }

    /// Returns the number of committed print jobs.
    pub async fn print_job_count(&self) -> usize {
        self.state.read().await.print_jobs.len()
    }

    /// Returns all committed asset file rows.
    pub async fn asset_files(&self) -> Vec<AssetFileRecord> {
        self.state.read().await.asset_files.clone()
    }

    /// Returns how many transactions were opened, committed and rolled back.
    pub async fn transaction_counts(&self) -> (usize, usize, usize) {
        let state = self.state.read().await;
        (state.begun, state.committed, state.rolled_back)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let mut state = self.state.write().await;
        state.check(Operation::Begin)?;
        state.begun += 1;
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            staged: Staged::default(),
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        state.check(Operation::Read)?;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn get_shipping_record(&self, order_id: OrderId) -> Result<Option<ShippingRecord>> {
        let state = self.state.read().await;
        state.check(Operation::Read)?;
        Ok(state.shipping.get(&order_id).cloned())
    }

    async fn list_print_jobs(&self, order_id: OrderId) -> Result<Vec<PrintJob>> {
        let state = self.state.read().await;
        state.check(Operation::Read)?;
        Ok(state
            .print_jobs
            .values()
            .filter(|job| job.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_asset_files(&self, print_job_id: PrintJobId) -> Result<Vec<AssetFileRecord>> {
        let state = self.state.read().await;
        state.check(Operation::Read)?;
        Ok(state
            .asset_files
            .iter()
            .filter(|file| file.print_job_id == print_job_id)
            .cloned()
            .collect())
    }

    async fn count_orders(&self) -> Result<u64> {
        let state = self.state.read().await;
        state.check(Operation::Read)?;
        Ok(state.orders.len() as u64)
    }
}

#[derive(Default)]
struct Staged {
    orders: Vec<Order>,
    shipping: Vec<ShippingRecord>,
    print_jobs: Vec<PrintJob>,
    asset_files: Vec<AssetFileRecord>,
}

impl Staged {
    fn has_order(&self, state: &MemoryState, order_id: OrderId) -> bool {
        state.orders.contains_key(&order_id) || self.orders.iter().any(|o| o.id == order_id)
    }

    fn has_print_job(&self, state: &MemoryState, id: PrintJobId) -> bool {
        state.print_jobs.contains_key(&id) || self.print_jobs.iter().any(|j| j.id == id)
    }
}

/// A transaction against [`InMemoryOrderStore`].
pub struct InMemoryTransaction {
    state: Arc<RwLock<MemoryState>>,
    staged: Staged,
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        let mut state = self.state.write().await;
        state.check(Operation::InsertOrder)?;

        state.next_order_id += 1;
        let id = OrderId::new(state.next_order_id);
        self.staged.orders.push(Order::from_new(id, order.clone()));
        Ok(id)
    }

    async fn insert_shipping_record(&mut self, record: &ShippingRecord) -> Result<()> {
        let op = Operation::InsertShippingRecord;
        let state = self.state.read().await;
        state.check(op)?;

        if !self.staged.has_order(&state, record.order_id) {
            return Err(StoreError::integrity(
                op,
                format!("order {} does not exist", record.order_id),
            ));
        }
        let duplicate = state.shipping.contains_key(&record.order_id)
            || self
                .staged
                .shipping
                .iter()
                .any(|s| s.order_id == record.order_id);
        if duplicate {
            return Err(StoreError::integrity(
                op,
                format!("order {} already has a shipping record", record.order_id),
            ));
        }

        self.staged.shipping.push(record.clone());
        Ok(())
    }

    async fn insert_print_job(&mut self, order_id: OrderId) -> Result<PrintJobId> {
        let op = Operation::InsertPrintJob;
        let mut state = self.state.write().await;
        state.check(op)?;

        if !self.staged.has_order(&state, order_id) {
            return Err(StoreError::integrity(
                op,
                format!("order {order_id} does not exist"),
            ));
        }

        state.next_print_job_id += 1;
        let id = PrintJobId::new(state.next_print_job_id);
        self.staged.print_jobs.push(PrintJob {
            id,
            order_id,
            status: PrintJobStatus::Queued,
        });
        Ok(id)
    }

    async fn list_cart_items(&mut self, session_id: &SessionId) -> Result<Vec<CartItem>> {
        let state = self.state.read().await;
        state.check(Operation::ListCartItems)?;
        Ok(state.carts.get(session_id).cloned().unwrap_or_default())
    }

    async fn insert_asset_file(&mut self, record: &AssetFileRecord) -> Result<()> {
        let op = Operation::InsertAssetFile;
        let state = self.state.read().await;
        state.check(op)?;

        if !self.staged.has_print_job(&state, record.print_job_id) {
            return Err(StoreError::integrity(
                op,
                format!("print job {} does not exist", record.print_job_id),
            ));
        }

        self.staged.asset_files.push(record.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(Operation::Commit)?;

        let Staged {
            orders,
            shipping,
            print_jobs,
            asset_files,
        } = self.staged;

        for order in orders {
            state.orders.insert(order.id, order);
        }
        for record in shipping {
            state.shipping.insert(record.order_id, record);
        }
        for job in print_jobs {
            state.print_jobs.insert(job.id, job);
        }
        state.asset_files.extend(asset_files);
        state.committed += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(Operation::Rollback)?;
        state.rolled_back += 1;
        Ok(())
    }
}
