//! Object storage for migrated model files.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// Trait for writing model files to durable storage.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), ServiceError>;
}

/// Asset store over any [`ObjectStore`] backend.
#[derive(Debug, Clone)]
pub struct ObjectStoreAssetStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreAssetStore {
    /// Wraps an existing backend.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Connects to an S3 bucket. Credentials come from the standard AWS
    /// environment variables.
    pub fn s3(bucket: &str, region: &str) -> Result<Self, ServiceError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()?;
        Ok(Self::new(Arc::new(store)))
    }

    /// A process-local backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Reads an object back.
    pub async fn get(&self, key: &str) -> Result<Bytes, ServiceError> {
        let object = self.store.get(&object_path(key)?).await?;
        Ok(object.bytes().await?)
    }
}

#[async_trait]
impl AssetStore for ObjectStoreAssetStore {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), ServiceError> {
        self.store
            .put(&object_path(key)?, PutPayload::from(bytes))
            .await?;
        Ok(())
    }
}

/// Parses `key` as an object location without re-encoding it.
///
/// Fails on empty segments, `.` or `..` segments and control characters.
pub fn object_path(key: &str) -> Result<Path, ServiceError> {
    Ok(Path::parse(key).map_err(object_store::Error::from)?)
}

#[derive(Debug, Default)]
struct InMemoryAssetState {
    objects: BTreeMap<String, Bytes>,
    put_attempts: usize,
    fail_on_put: bool,
}

/// In-memory asset store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetStore {
    state: Arc<RwLock<InMemoryAssetState>>,
}

impl InMemoryAssetStore {
    /// Creates a new in-memory asset store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on put calls.
    pub async fn set_fail_on_put(&self, fail: bool) {
        self.state.write().await.fail_on_put = fail;
    }

    /// Returns the number of put calls, including failed ones.
    pub async fn put_attempts(&self) -> usize {
        self.state.read().await.put_attempts
    }

    /// Returns the stored keys in order.
    pub async fn keys(&self) -> Vec<String> {
        self.state.read().await.objects.keys().cloned().collect()
    }

    /// Returns the object stored under `key`.
    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.state.read().await.objects.get(key).cloned()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        state.put_attempts += 1;

        if state.fail_on_put {
            return Err(ServiceError::unavailable("object store"));
        }

        state.objects.insert(key.to_string(), bytes);
        Ok(())
    }
}
