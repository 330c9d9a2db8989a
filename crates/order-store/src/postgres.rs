use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, PrintJobId, SessionId};
use domain::{
    AssetFileRecord, CartItem, NewOrder, Order, PaymentStatus, PrintJob, PrintJobStatus,
    ProductVariant, ShippingAddress, ShippingRecord,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Operation, Result, StoreError,
    store::{OrderStore, OrderTransaction},
};

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let op = Operation::Read;
        let status: String = row
            .try_get("payment_status")
            .map_err(StoreError::database(op))?;
        let payment_status = status
            .parse::<PaymentStatus>()
            .map_err(|e| StoreError::integrity(op, e.to_string()))?;

        Ok(Order {
            id: OrderId::new(row.try_get("id").map_err(StoreError::database(op))?),
            payment_reference: row
                .try_get("payment_reference")
                .map_err(StoreError::database(op))?,
            session_id: SessionId::new(
                row.try_get::<String, _>("browser_ssid")
                    .map_err(StoreError::database(op))?,
            ),
            amount: Money::from_cents(
                row.try_get("total_amount_cents")
                    .map_err(StoreError::database(op))?,
            ),
            payment_status,
            purchaser_name: row
                .try_get("purchaser_name")
                .map_err(StoreError::database(op))?,
            purchaser_email: row
                .try_get("purchaser_email")
                .map_err(StoreError::database(op))?,
            shipping_address: ShippingAddress {
                line1: row.try_get("address_1").map_err(StoreError::database(op))?,
                line2: row.try_get("address_2").map_err(StoreError::database(op))?,
                city: row.try_get("city").map_err(StoreError::database(op))?,
                state: row.try_get("state").map_err(StoreError::database(op))?,
                postal_code: row.try_get("zipcode").map_err(StoreError::database(op))?,
                country: row.try_get("country").map_err(StoreError::database(op))?,
            },
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(StoreError::database(op))?,
            print_job_id: None,
            shipping: None,
        })
    }

    fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
        let op = Operation::ListCartItems;

        let quantity: i32 = row.try_get("quantity").map_err(StoreError::database(op))?;
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| StoreError::integrity(op, format!("invalid quantity {quantity}")))?;

        let variant: String = row
            .try_get("template_type")
            .map_err(StoreError::database(op))?;
        let variant = variant
            .parse::<ProductVariant>()
            .map_err(|e| StoreError::integrity(op, e.to_string()))?;

        Ok(CartItem {
            session_id: SessionId::new(
                row.try_get::<String, _>("browser_ssid")
                    .map_err(StoreError::database(op))?,
            ),
            asset_reference: row.try_get("stl_url").map_err(StoreError::database(op))?,
            quantity,
            variant,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    type Transaction = PostgresTransaction;

    #[tracing::instrument(skip(self))]
    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::database(Operation::Begin))?;
        Ok(PostgresTransaction { tx })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, purchaser_email, purchaser_name, address_1, address_2, city, state,
                   zipcode, country, browser_ssid, payment_reference, total_amount_cents,
                   payment_status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database(Operation::Read))?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_shipping_record(&self, order_id: OrderId) -> Result<Option<ShippingRecord>> {
        let op = Operation::Read;
        let row = sqlx::query(
            r#"
            SELECT order_id, carrier_shipment_id, carrier, service, tracking_number,
                   ship_rate_cents, shipping_label_url
            FROM shipping
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database(op))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ShippingRecord {
            order_id: OrderId::new(row.try_get("order_id").map_err(StoreError::database(op))?),
            carrier_shipment_id: row
                .try_get("carrier_shipment_id")
                .map_err(StoreError::database(op))?,
            carrier: row.try_get("carrier").map_err(StoreError::database(op))?,
            service_level: row.try_get("service").map_err(StoreError::database(op))?,
            tracking_number: row
                .try_get("tracking_number")
                .map_err(StoreError::database(op))?,
            rate: Money::from_cents(
                row.try_get("ship_rate_cents")
                    .map_err(StoreError::database(op))?,
            ),
            label_url: row
                .try_get("shipping_label_url")
                .map_err(StoreError::database(op))?,
        }))
    }

    async fn list_print_jobs(&self, order_id: OrderId) -> Result<Vec<PrintJob>> {
        let op = Operation::Read;
        let rows = sqlx::query(
            "SELECT id, order_id, status FROM print_jobs WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database(op))?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(StoreError::database(op))?;
                Ok(PrintJob {
                    id: PrintJobId::new(row.try_get("id").map_err(StoreError::database(op))?),
                    order_id: OrderId::new(
                        row.try_get("order_id").map_err(StoreError::database(op))?,
                    ),
                    status: status
                        .parse::<PrintJobStatus>()
                        .map_err(|e| StoreError::integrity(op, e.to_string()))?,
                })
            })
            .collect()
    }

    async fn list_asset_files(&self, print_job_id: PrintJobId) -> Result<Vec<AssetFileRecord>> {
        let op = Operation::Read;
        let rows = sqlx::query(
            "SELECT browser_ssid, file_name, job_id, quantity FROM asset_files WHERE job_id = $1 ORDER BY id",
        )
        .bind(print_job_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database(op))?;

        rows.into_iter()
            .map(|row| {
                let quantity: i32 = row.try_get("quantity").map_err(StoreError::database(op))?;
                Ok(AssetFileRecord {
                    session_id: SessionId::new(
                        row.try_get::<String, _>("browser_ssid")
                            .map_err(StoreError::database(op))?,
                    ),
                    file_name: row.try_get("file_name").map_err(StoreError::database(op))?,
                    print_job_id: PrintJobId::new(
                        row.try_get("job_id").map_err(StoreError::database(op))?,
                    ),
                    quantity: u32::try_from(quantity).map_err(|_| {
                        StoreError::integrity(op, format!("invalid quantity {quantity}"))
                    })?,
                })
            })
            .collect()
    }

    async fn count_orders(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::database(Operation::Read))?;
        Ok(count.max(0) as u64)
    }
}

/// An open PostgreSQL transaction.
///
/// Dropping it without calling `commit` rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    #[tracing::instrument(skip_all, fields(session_id = %order.session_id))]
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        let address = &order.shipping_address;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                purchaser_email, purchaser_name, address_1, address_2, city, state, zipcode,
                country, browser_ssid, payment_reference, total_amount_cents, payment_status,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&order.purchaser_email)
        .bind(&order.purchaser_name)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(order.session_id.as_str())
        .bind(&order.payment_reference)
        .bind(order.amount.cents())
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::database(Operation::InsertOrder))?;

        Ok(OrderId::new(id))
    }

    #[tracing::instrument(skip_all, fields(order_id = %record.order_id))]
    async fn insert_shipping_record(&mut self, record: &ShippingRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shipping (
                order_id, carrier_shipment_id, carrier, service, tracking_number,
                ship_rate_cents, shipping_label_url
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.order_id.as_i64())
        .bind(&record.carrier_shipment_id)
        .bind(&record.carrier)
        .bind(&record.service_level)
        .bind(&record.tracking_number)
        .bind(record.rate.cents())
        .bind(&record.label_url)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::database(Operation::InsertShippingRecord))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn insert_print_job(&mut self, order_id: OrderId) -> Result<PrintJobId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO print_jobs (order_id, status) VALUES ($1, $2) RETURNING id",
        )
        .bind(order_id.as_i64())
        .bind(PrintJobStatus::Queued.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::database(Operation::InsertPrintJob))?;

        Ok(PrintJobId::new(id))
    }

    #[tracing::instrument(skip(self))]
    async fn list_cart_items(&mut self, session_id: &SessionId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT browser_ssid, stl_url, quantity, template_type
            FROM cart_items
            WHERE browser_ssid = $1
            ORDER BY id ASC
            "#,
        )
        .bind(session_id.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::database(Operation::ListCartItems))?;

        let items = rows
            .into_iter()
            .map(PostgresOrderStore::row_to_cart_item)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(items = items.len(), "cart read");
        Ok(items)
    }

    #[tracing::instrument(skip_all, fields(print_job_id = %record.print_job_id))]
    async fn insert_asset_file(&mut self, record: &AssetFileRecord) -> Result<()> {
        let quantity = i32::try_from(record.quantity).map_err(|_| {
            StoreError::integrity(
                Operation::InsertAssetFile,
                format!("quantity {} out of range", record.quantity),
            )
        })?;

        sqlx::query(
            "INSERT INTO asset_files (browser_ssid, file_name, job_id, quantity) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.session_id.as_str())
        .bind(&record.file_name)
        .bind(record.print_job_id.as_i64())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::database(Operation::InsertAssetFile))?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(StoreError::database(Operation::Commit))
    }

    async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(StoreError::database(Operation::Rollback))
    }
}
