//! Moving a session's model files from local disk to object storage.

use std::path::PathBuf;

use bytes::Bytes;
use common::SessionId;
use domain::{CartItem, DomainError, is_safe_path_element};

use crate::error::{FulfillmentError, Result};
use crate::services::assets::{AssetStore, object_path};

/// Local directories that hold generated model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocations {
    /// Per-session output, laid out as `{output_dir}/{session_id}/{file}`.
    pub output_dir: PathBuf,
    /// Shared designs, laid out as `{designs_dir}/{file}`.
    pub designs_dir: PathBuf,
}

impl Default for AssetLocations {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            designs_dir: PathBuf::from("../designs"),
        }
    }
}

/// A cart item mapped to its local file and object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub file_name: String,
    pub local_path: PathBuf,
    pub key: String,
    pub quantity: u32,
}

/// Resolves and uploads model files.
#[derive(Debug, Clone)]
pub struct AssetMigrator<A> {
    store: A,
    locations: AssetLocations,
}

impl<A: AssetStore> AssetMigrator<A> {
    pub fn new(store: A, locations: AssetLocations) -> Self {
        Self { store, locations }
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    /// Maps a cart item to its local path and object key.
    ///
    /// File names containing `design` live in the shared designs directory;
    /// everything else lives under the session's output directory. The key
    /// is `{session_id}/{file_name}` either way.
    pub fn resolve(&self, session_id: &SessionId, item: &CartItem) -> Result<ResolvedAsset> {
        let session = session_id.as_str();
        if !is_safe_path_element(session) {
            return Err(FulfillmentError::InvalidAssetName(
                DomainError::UnsafePathElement {
                    field: "session id",
                    value: session.to_string(),
                },
            ));
        }

        let file_name = item.file_name();
        if !is_safe_path_element(file_name) {
            return Err(FulfillmentError::InvalidAssetName(
                DomainError::UnsafePathElement {
                    field: "file name",
                    value: file_name.to_string(),
                },
            ));
        }

        let key = format!("{session}/{file_name}");
        if object_path(&key).is_err() {
            return Err(FulfillmentError::InvalidAssetName(
                DomainError::UnsafePathElement {
                    field: "object key",
                    value: key,
                },
            ));
        }

        let local_path = if file_name.contains("design") {
            self.locations.designs_dir.join(file_name)
        } else {
            self.locations.output_dir.join(session).join(file_name)
        };

        Ok(ResolvedAsset {
            file_name: file_name.to_string(),
            local_path,
            key,
            quantity: item.quantity,
        })
    }

    /// Resolves every item, failing on the first unsafe name.
    pub fn resolve_all(
        &self,
        session_id: &SessionId,
        items: &[CartItem],
    ) -> Result<Vec<ResolvedAsset>> {
        items
            .iter()
            .map(|item| self.resolve(session_id, item))
            .collect()
    }

    /// Reads the local file and stores it under its key.
    #[tracing::instrument(skip_all, fields(key = %asset.key))]
    pub async fn upload(&self, asset: &ResolvedAsset) -> Result<()> {
        let contents = tokio::fs::read(&asset.local_path).await.map_err(|source| {
            FulfillmentError::ReadAsset {
                path: asset.local_path.clone(),
                source,
            }
        })?;

        self.store
            .put(&asset.key, Bytes::from(contents))
            .await
            .map_err(|source| FulfillmentError::UploadAsset {
                key: asset.key.clone(),
                source,
            })?;
        metrics::counter!("fulfillment_assets_uploaded_total").increment(1);
        tracing::debug!(path = %asset.local_path.display(), "asset uploaded");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::ProductVariant;

    use super::*;
    use crate::services::InMemoryAssetStore;

    fn item(reference: &str) -> CartItem {
        CartItem::new(SessionId::new("abc123"), reference, 2, ProductVariant::Custom)
    }

    fn migrator(root: &std::path::Path) -> AssetMigrator<InMemoryAssetStore> {
        AssetMigrator::new(
            InMemoryAssetStore::new(),
            AssetLocations {
                output_dir: root.join("output"),
                designs_dir: root.join("designs"),
            },
        )
    }

    #[test]
    fn test_design_files_resolve_to_designs_dir() {
        let migrator = migrator(std::path::Path::new("/srv"));
        let asset = migrator
            .resolve(&SessionId::new("abc123"), &item("https://api.example.com/x/design.stl"))
            .unwrap();

        assert_eq!(asset.local_path, PathBuf::from("/srv/designs/design.stl"));
        assert_eq!(asset.key, "abc123/design.stl");
        assert_eq!(asset.quantity, 2);
    }

    #[test]
    fn test_other_files_resolve_to_session_output() {
        let migrator = migrator(std::path::Path::new("/srv"));
        let asset = migrator
            .resolve(&SessionId::new("abc123"), &item("https://api.example.com/x/model.stl"))
            .unwrap();

        assert_eq!(
            asset.local_path,
            PathBuf::from("/srv/output/abc123/model.stl")
        );
        assert_eq!(asset.key, "abc123/model.stl");
    }

    #[test]
    fn test_unsafe_session_id() {
        let migrator = migrator(std::path::Path::new("/srv"));
        let err = migrator
            .resolve(&SessionId::new("../etc"), &item("model.stl"))
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::InvalidAssetName(DomainError::UnsafePathElement {
                field: "session id",
                ..
            })
        ));
    }

    #[test]
    fn test_unsafe_file_name() {
        let migrator = migrator(std::path::Path::new("/srv"));
        let err = migrator
            .resolve(&SessionId::new("abc123"), &item("x/..\\secret.stl"))
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::InvalidAssetName(DomainError::UnsafePathElement {
                field: "file name",
                ..
            })
        ));
    }

    #[test]
    fn test_bracketed_file_name_keeps_exact_key() {
        let migrator = migrator(std::path::Path::new("/srv"));
        let asset = migrator
            .resolve(&SessionId::new("abc123"), &item("https://x/logo [final]#2.stl"))
            .unwrap();
        assert_eq!(asset.key, "abc123/logo [final]#2.stl");
    }

    #[test]
    fn test_control_character_file_name() {
        let migrator = migrator(std::path::Path::new("/srv"));
        let err = migrator
            .resolve(&SessionId::new("abc123"), &item("model\u{7}.stl"))
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::InvalidAssetName(DomainError::UnsafePathElement {
                field: "object key",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_upload_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("output/abc123")).unwrap();
        std::fs::write(dir.path().join("output/abc123/model.stl"), b"solid m").unwrap();

        let migrator = migrator(dir.path());
        let asset = migrator
            .resolve(&SessionId::new("abc123"), &item("model.stl"))
            .unwrap();
        migrator.upload(&asset).await.unwrap();

        assert_eq!(
            migrator.store().object("abc123/model.stl").await.unwrap(),
            Bytes::from_static(b"solid m")
        );
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = migrator(dir.path());
        let asset = migrator
            .resolve(&SessionId::new("abc123"), &item("model.stl"))
            .unwrap();

        let err = migrator.upload(&asset).await.unwrap_err();
        assert_eq!(err.step(), "read_asset");
        assert_eq!(migrator.store().put_attempts().await, 0);
    }
}
