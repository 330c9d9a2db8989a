//! Fulfillment coordinator that turns an authorized checkout into a
//! committed order.

use chrono::Utc;
use domain::{AssetFileRecord, NewOrder, Order, OrderRequest, ShippingRecord};
use order_store::{OrderStore, OrderTransaction};

use crate::error::{FulfillmentError, Result};
use crate::label::{LabelPurchaser, ShippingConfig};
use crate::migration::{AssetLocations, AssetMigrator};
use crate::order_fulfillment as steps;
use crate::services::assets::AssetStore;
use crate::services::shipping::ShippingCarrier;

/// Side effects outside the database that a run has already made.
///
/// Nothing undoes them. They are logged when a run fails so an operator
/// can void the label or delete the objects by hand.
#[derive(Debug, Default)]
struct ExternalEffects {
    label: Option<String>,
    uploaded: Vec<String>,
}

/// Orchestrates one order run.
///
/// The run holds a single database transaction open while it calls the
/// carrier and uploads files:
///
/// 1. begin transaction
/// 2. insert order
/// 3. quote, select and buy the shipping label
/// 4. insert shipping record
/// 5. insert print job
/// 6. read the session's cart
/// 7. for each cart item: upload its file, insert its asset file record
/// 8. commit
///
/// Any failure rolls the transaction back and stops the run. A bought
/// label is not refunded and uploaded objects are not deleted. Running the
/// same request twice inserts two orders and buys two labels.
pub struct FulfillmentCoordinator<S, C, A>
where
    S: OrderStore,
    C: ShippingCarrier,
    A: AssetStore,
{
    store: S,
    labels: LabelPurchaser<C>,
    assets: AssetMigrator<A>,
}

impl<S, C, A> FulfillmentCoordinator<S, C, A>
where
    S: OrderStore,
    C: ShippingCarrier,
    A: AssetStore,
{
    /// Creates a new fulfillment coordinator.
    pub fn new(
        store: S,
        carrier: C,
        assets: A,
        shipping: ShippingConfig,
        locations: AssetLocations,
    ) -> Self {
        Self {
            store,
            labels: LabelPurchaser::new(carrier, shipping),
            assets: AssetMigrator::new(assets, locations),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn carrier(&self) -> &C {
        self.labels.carrier()
    }

    pub fn asset_store(&self) -> &A {
        self.assets.store()
    }

    /// Runs every fulfillment step for an already-validated request.
    ///
    /// On success the returned order carries its print job id and shipping
    /// summary. On failure nothing is committed and the error names the
    /// step that failed.
    #[tracing::instrument(
        skip_all,
        fields(
            session_id = %request.session_id,
            payment_reference = %request.payment_reference
        )
    )]
    pub async fn process_order(&self, request: &OrderRequest) -> Result<Order> {
        metrics::counter!("fulfillment_orders_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run(request).await;

        metrics::histogram!("fulfillment_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("fulfillment_orders_completed").increment(1);
                tracing::info!(order_id = %order.id, "order fulfilled");
            }
            Err(e) => {
                metrics::counter!("fulfillment_orders_failed", "step" => e.step()).increment(1);
            }
        }
        result
    }

    async fn run(&self, request: &OrderRequest) -> Result<Order> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(FulfillmentError::BeginTransaction)?;
        let mut effects = ExternalEffects::default();

        let order = match self.run_in_transaction(&mut tx, request, &mut effects).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(step = e.step(), error = %e, "fulfillment step failed");
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                report_orphans(&effects);
                return Err(e);
            }
        };

        tracing::info!(step = steps::STEP_COMMIT, "fulfillment step started");
        if let Err(e) = tx.commit().await {
            let e = FulfillmentError::Commit(e);
            tracing::error!(step = e.step(), error = %e, "fulfillment step failed");
            report_orphans(&effects);
            return Err(e);
        }

        Ok(order)
    }

    async fn run_in_transaction(
        &self,
        tx: &mut S::Transaction,
        request: &OrderRequest,
        effects: &mut ExternalEffects,
    ) -> Result<Order> {
        tracing::info!(step = steps::STEP_INSERT_ORDER, "fulfillment step started");
        let row = NewOrder::from_request(request, Utc::now());
        let order_id = tx
            .insert_order(&row)
            .await
            .map_err(FulfillmentError::InsertOrder)?;

        tracing::info!(step = steps::STEP_PURCHASE_LABEL, %order_id, "fulfillment step started");
        let label = self.labels.purchase(request).await?;
        effects.label = Some(label.shipment.tracking_code.clone());

        tracing::info!(step = steps::STEP_INSERT_SHIPPING, %order_id, "fulfillment step started");
        let record = ShippingRecord {
            order_id,
            carrier_shipment_id: label.shipment.id.clone(),
            carrier: label.shipment.selected_rate.carrier.clone(),
            service_level: label.shipment.selected_rate.service.clone(),
            tracking_number: label.shipment.tracking_code.clone(),
            rate: label.shipment.selected_rate.rate,
            label_url: label.shipment.label_url.clone(),
        };
        tx.insert_shipping_record(&record)
            .await
            .map_err(FulfillmentError::InsertShipping)?;

        tracing::info!(step = steps::STEP_INSERT_PRINT_JOB, %order_id, "fulfillment step started");
        let print_job_id = tx
            .insert_print_job(order_id)
            .await
            .map_err(FulfillmentError::InsertPrintJob)?;

        tracing::info!(step = steps::STEP_READ_CART, %order_id, "fulfillment step started");
        let items = tx
            .list_cart_items(&request.session_id)
            .await
            .map_err(FulfillmentError::ReadCart)?;

        // Every name is checked before the first upload.
        let resolved = self.assets.resolve_all(&request.session_id, &items)?;

        tracing::info!(
            step = steps::STEP_UPLOAD_ASSET,
            %order_id,
            files = resolved.len(),
            "fulfillment step started"
        );
        for asset in &resolved {
            self.assets.upload(asset).await?;
            effects.uploaded.push(asset.key.clone());

            tx.insert_asset_file(&AssetFileRecord {
                session_id: request.session_id.clone(),
                file_name: asset.file_name.clone(),
                print_job_id,
                quantity: asset.quantity,
            })
            .await
            .map_err(FulfillmentError::InsertAssetFile)?;
        }

        let mut order = Order::from_new(order_id, row);
        order.print_job_id = Some(print_job_id);
        order.shipping = Some(label.summary);
        Ok(order)
    }
}

fn report_orphans(effects: &ExternalEffects) {
    if let Some(tracking_number) = &effects.label {
        metrics::counter!("fulfillment_orphaned_labels_total").increment(1);
        tracing::warn!(%tracking_number, "shipping label was bought for an order that was not saved");
    }
    if !effects.uploaded.is_empty() {
        tracing::warn!(keys = ?effects.uploaded, "model files were uploaded for an order that was not saved");
    }
}
