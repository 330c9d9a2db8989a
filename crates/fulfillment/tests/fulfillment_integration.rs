//! Integration tests for order fulfillment runs.

use std::path::Path;

use bytes::Bytes;
use common::{Money, SessionId};
use domain::{CartItem, OrderRequest, PaymentStatus, ProductVariant, ShippingAddress};
use fulfillment::{
    AssetLocations, ErrorKind, FulfillmentCoordinator, FulfillmentError, InMemoryAssetStore,
    InMemoryCarrier, ObjectStoreAssetStore, ShippingConfig,
};
use order_store::{InMemoryOrderStore, Operation, OrderStore};
use tempfile::TempDir;

type TestCoordinator =
    FulfillmentCoordinator<InMemoryOrderStore, InMemoryCarrier, InMemoryAssetStore>;

struct TestHarness {
    coordinator: TestCoordinator,
    store: InMemoryOrderStore,
    carrier: InMemoryCarrier,
    assets: InMemoryAssetStore,
    dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryOrderStore::new();
        let carrier = InMemoryCarrier::new();
        let assets = InMemoryAssetStore::new();

        let coordinator = FulfillmentCoordinator::new(
            store.clone(),
            carrier.clone(),
            assets.clone(),
            ShippingConfig::default(),
            locations(dir.path()),
        );

        Self {
            coordinator,
            store,
            carrier,
            assets,
            dir,
        }
    }

    /// Writes a session output file and stages it in the cart.
    async fn add_output_file(&self, ssid: &str, name: &str, quantity: u32) {
        let dir = self.dir.path().join("output").join(ssid);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), format!("solid {name}")).unwrap();
        self.add_cart_item(ssid, name, quantity).await;
    }

    /// Writes a shared design file and stages it in the cart.
    async fn add_design_file(&self, ssid: &str, name: &str, quantity: u32) {
        let dir = self.dir.path().join("designs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), format!("solid {name}")).unwrap();
        self.add_cart_item(ssid, name, quantity).await;
    }

    async fn add_cart_item(&self, ssid: &str, name: &str, quantity: u32) {
        self.store
            .add_cart_item(CartItem::new(
                ssid,
                format!("https://api.example.com/output/{ssid}/{name}"),
                quantity,
                ProductVariant::Custom,
            ))
            .await;
    }
}

fn locations(root: &Path) -> AssetLocations {
    AssetLocations {
        output_dir: root.join("output"),
        designs_dir: root.join("designs"),
    }
}

fn request(ssid: &str) -> OrderRequest {
    OrderRequest {
        payment_reference: "pi_3Nabc".to_string(),
        session_id: SessionId::new(ssid),
        amount: Money::from_cents(1598),
        payment_status: PaymentStatus::RequiresCapture,
        purchaser_name: "Jane Doe".to_string(),
        purchaser_email: "jane@example.com".to_string(),
        shipping_address: ShippingAddress {
            line1: "1 Main St".to_string(),
            line2: Some("Apt 2".to_string()),
            city: "Columbus".to_string(),
            state: "OH".to_string(),
            postal_code: "43215".to_string(),
            country: "US".to_string(),
        },
    }
}

#[tokio::test]
async fn test_happy_path_commits_every_row() {
    let h = TestHarness::new();
    h.add_design_file("abc123", "design.stl", 2).await;

    let order = h.coordinator.process_order(&request("abc123")).await.unwrap();

    // Order row
    assert_eq!(order.payment_reference, "pi_3Nabc");
    assert_eq!(order.amount, Money::from_cents(1598));
    let orders = h.store.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order.id);

    // Shipping row references the order and the bought label
    let shipping = h.store.get_shipping_record(order.id).await.unwrap().unwrap();
    let purchases = h.carrier.purchases().await;
    assert_eq!(purchases.len(), 1);
    assert_eq!(shipping.carrier, "USPS");
    assert_eq!(shipping.rate, Money::from_cents(500));
    assert_eq!(shipping.tracking_number, purchases[0].tracking_code);
    assert_eq!(shipping.carrier_shipment_id, purchases[0].id);
    assert_eq!(shipping.label_url, purchases[0].label_url);

    // Print job references the order
    let jobs = h.store.list_print_jobs(order.id).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(Some(jobs[0].id), order.print_job_id);

    // Asset row references the print job
    let files = h.store.list_asset_files(jobs[0].id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "design.stl");
    assert_eq!(files[0].quantity, 2);
    assert_eq!(files[0].session_id.as_str(), "abc123");

    // Object stored under the session key
    assert_eq!(h.assets.keys().await, vec!["abc123/design.stl".to_string()]);
    assert_eq!(
        h.assets.object("abc123/design.stl").await,
        Some(Bytes::from("solid design.stl"))
    );

    // Caller summary
    let summary = order.shipping.unwrap();
    assert_eq!(summary.carrier, "USPS");
    assert_eq!(summary.tracking_number, shipping.tracking_number);
    assert_eq!(summary.to_address.postal_code, "43215");

    assert_eq!(h.store.transaction_counts().await, (1, 1, 0));
}

#[tokio::test]
async fn test_files_upload_in_cart_order() {
    let h = TestHarness::new();
    h.add_output_file("abc123", "b.stl", 1).await;
    h.add_output_file("abc123", "a.stl", 3).await;

    let order = h.coordinator.process_order(&request("abc123")).await.unwrap();

    let files = h
        .store
        .list_asset_files(order.print_job_id.unwrap())
        .await
        .unwrap();
    let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["b.stl", "a.stl"]);
    assert_eq!(files[1].quantity, 3);
}

#[tokio::test]
async fn test_cheapest_rate_is_bought() {
    let h = TestHarness::new();
    h.carrier
        .set_rates(vec![
            ("UPS", "Ground", Money::from_cents(1210)),
            ("USPS", "Priority", Money::from_cents(758)),
            ("USPS", "GroundAdvantage", Money::from_cents(758)),
        ])
        .await;

    let order = h.coordinator.process_order(&request("abc123")).await.unwrap();

    let shipping = h.store.get_shipping_record(order.id).await.unwrap().unwrap();
    assert_eq!(shipping.service_level, "Priority");
    assert_eq!(shipping.rate, Money::from_cents(758));
}

#[tokio::test]
async fn test_insert_order_failure_buys_no_label() {
    let h = TestHarness::new();
    h.store.set_fail_on(Operation::InsertOrder, true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillmentError::InsertOrder(_)));
    assert_eq!(h.carrier.quote_count().await, 0);
    assert_eq!(h.carrier.purchase_count().await, 0);
    assert!(h.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_begin_failure_touches_nothing() {
    let h = TestHarness::new();
    h.store.set_fail_on(Operation::Begin, true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert_eq!(err.step(), "begin_transaction");
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert_eq!(h.carrier.quote_count().await, 0);
    assert_eq!(h.store.transaction_counts().await, (0, 0, 0));
}

#[tokio::test]
async fn test_label_failure_rolls_back_order() {
    let h = TestHarness::new();
    h.carrier.set_fail_on_buy(true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert_eq!(err.step(), "purchase_label");
    assert_eq!(err.kind(), ErrorKind::External);
    assert!(h.store.orders().await.is_empty());
    assert_eq!(h.store.transaction_counts().await, (1, 0, 1));
}

#[tokio::test]
async fn test_shipping_insert_failure_leaves_label_bought() {
    let h = TestHarness::new();
    h.store
        .set_fail_on(Operation::InsertShippingRecord, true)
        .await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillmentError::InsertShipping(_)));
    // The label stays bought; nothing voids it.
    assert_eq!(h.carrier.purchase_count().await, 1);
    assert!(h.store.orders().await.is_empty());
    assert_eq!(h.store.shipping_count().await, 0);
    assert_eq!(h.store.transaction_counts().await, (1, 0, 1));
}

#[tokio::test]
async fn test_print_job_failure_rolls_back() {
    let h = TestHarness::new();
    h.store.set_fail_on(Operation::InsertPrintJob, true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert_eq!(err.step(), "insert_print_job");
    assert!(h.store.orders().await.is_empty());
    assert_eq!(h.store.shipping_count().await, 0);
    assert_eq!(h.store.print_job_count().await, 0);
}

#[tokio::test]
async fn test_cart_read_failure_rolls_back() {
    let h = TestHarness::new();
    h.store.set_fail_on(Operation::ListCartItems, true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert_eq!(err.step(), "read_cart");
    assert!(h.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_empty_cart_uploads_nothing() {
    let h = TestHarness::new();
    h.add_output_file("someone-else", "model.stl", 1).await;

    let order = h.coordinator.process_order(&request("abc123")).await.unwrap();

    assert_eq!(h.assets.put_attempts().await, 0);
    assert!(
        h.store
            .list_asset_files(order.print_job_id.unwrap())
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(h.store.orders().await.len(), 1);
}

#[tokio::test]
async fn test_unsafe_session_rejected_before_upload() {
    let h = TestHarness::new();
    h.add_cart_item("..", "model.stl", 1).await;

    let err = h
        .coordinator
        .process_order(&request(".."))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.assets.put_attempts().await, 0);
    assert!(h.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_unsafe_file_name_rejected_before_upload() {
    let h = TestHarness::new();
    h.add_output_file("abc123", "good.stl", 1).await;
    h.add_cart_item("abc123", "bad\\..\\name.stl", 1).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillmentError::InvalidAssetName(_)));
    assert_eq!(h.assets.put_attempts().await, 0);
    assert!(h.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_missing_local_file_is_integrity_failure() {
    let h = TestHarness::new();
    h.add_cart_item("abc123", "never-written.stl", 1).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert_eq!(err.step(), "read_asset");
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(h.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_upload_failure_rolls_back() {
    let h = TestHarness::new();
    h.add_output_file("abc123", "model.stl", 1).await;
    h.assets.set_fail_on_put(true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FulfillmentError::UploadAsset { ref key, .. } if key == "abc123/model.stl"
    ));
    assert!(h.store.orders().await.is_empty());
    assert_eq!(h.carrier.purchase_count().await, 1);
}

#[tokio::test]
async fn test_asset_row_failure_keeps_uploaded_object() {
    let h = TestHarness::new();
    h.add_output_file("abc123", "model.stl", 1).await;
    h.store.set_fail_on(Operation::InsertAssetFile, true).await;

    let err = h
        .coordinator
        .process_order(&request("abc123"))
        .await
        .unwrap_err();

    assert_eq!(err.step(), "insert_asset_file");
    assert!(h.store.orders().await.is_empty());
    assert!(h.store.asset_files().await.is_empty());
    // The object is not deleted.
    assert_eq!(h.assets.keys().await, vec!["abc123/model.stl".to_string()]);
}

#[tokio::test]
async fn test_repeated_run_is_not_deduplicated() {
    let h = TestHarness::new();
    h.add_output_file("abc123", "model.stl", 1).await;

    let first = h.coordinator.process_order(&request("abc123")).await.unwrap();
    let second = h.coordinator.process_order(&request("abc123")).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(h.store.orders().await.len(), 2);
    assert_eq!(h.carrier.purchase_count().await, 2);
    assert_eq!(h.store.print_job_count().await, 2);
    assert_eq!(h.store.asset_files().await.len(), 2);
    // Same key, overwritten in place.
    assert_eq!(h.assets.keys().await.len(), 1);
    assert_eq!(h.assets.put_attempts().await, 2);
}

#[tokio::test]
async fn test_end_to_end_with_object_store() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("designs")).unwrap();
    std::fs::write(dir.path().join("designs/design.stl"), b"solid design").unwrap();

    let store = InMemoryOrderStore::new();
    store
        .add_cart_item(CartItem::new(
            "abc123",
            "https://api.example.com/designs/design.stl",
            2,
            ProductVariant::Solid,
        ))
        .await;
    let objects = ObjectStoreAssetStore::in_memory();
    let coordinator = FulfillmentCoordinator::new(
        store.clone(),
        InMemoryCarrier::new(),
        objects.clone(),
        ShippingConfig::default(),
        locations(dir.path()),
    );

    let order = coordinator.process_order(&request("abc123")).await.unwrap();

    assert_eq!(
        objects.get("abc123/design.stl").await.unwrap(),
        Bytes::from_static(b"solid design")
    );
    let shipping = store.get_shipping_record(order.id).await.unwrap().unwrap();
    assert_eq!(shipping.rate.to_decimal_string(), "5.00");
    let files = store
        .list_asset_files(order.print_job_id.unwrap())
        .await
        .unwrap();
    assert_eq!(files[0].quantity, 2);
}

#[tokio::test]
async fn test_bracketed_file_name_is_stored_under_recorded_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("output/abc123")).unwrap();
    std::fs::write(dir.path().join("output/abc123/logo [final].stl"), b"solid logo").unwrap();

    let store = InMemoryOrderStore::new();
    store
        .add_cart_item(CartItem::new(
            "abc123",
            "https://api.example.com/output/abc123/logo [final].stl",
            1,
            ProductVariant::Text,
        ))
        .await;
    let objects = ObjectStoreAssetStore::in_memory();
    let coordinator = FulfillmentCoordinator::new(
        store.clone(),
        InMemoryCarrier::new(),
        objects.clone(),
        ShippingConfig::default(),
        locations(dir.path()),
    );

    let order = coordinator.process_order(&request("abc123")).await.unwrap();

    let files = store
        .list_asset_files(order.print_job_id.unwrap())
        .await
        .unwrap();
    assert_eq!(files[0].file_name, "logo [final].stl");
    assert_eq!(
        objects
            .get(&format!("abc123/{}", files[0].file_name))
            .await
            .unwrap(),
        Bytes::from_static(b"solid logo")
    );
}
