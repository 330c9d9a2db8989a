//! Fulfillment error types.

use std::path::PathBuf;

use domain::DomainError;
use order_store::StoreError;
use thiserror::Error;

use crate::order_fulfillment as steps;

/// Errors raised by the external service adapters.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The service answered with a body we could not interpret.
    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    /// The service is unreachable. Raised by the in-memory fakes when a
    /// failure has been injected.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// An identifier that cannot be used in a request path. Nothing was sent.
    #[error("{service} rejected identifier {id:?}")]
    InvalidId { service: &'static str, id: String },

    /// A carrier quote carried no rates to choose from.
    #[error("Shipment {shipment_id} has no rates")]
    NoRates { shipment_id: String },

    /// Object storage error.
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

impl ServiceError {
    pub(crate) fn unavailable(service: &'static str) -> Self {
        ServiceError::Unavailable {
            service,
            message: "service unavailable".to_string(),
        }
    }
}

/// Coarse classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input such as an unsafe file name.
    Validation,
    /// The database or filesystem failed.
    Infrastructure,
    /// A payment, carrier or storage provider failed.
    External,
    /// A row or file that should exist does not, or a constraint failed.
    Integrity,
}

/// Errors that abort an order run.
///
/// Each variant names the step that failed and carries the underlying
/// cause. When the run fails after the label purchase, the label stays
/// bought; when it fails after an upload, the object stays stored.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Failed to begin transaction: {0}")]
    BeginTransaction(#[source] StoreError),

    #[error("Failed to insert order: {0}")]
    InsertOrder(#[source] StoreError),

    #[error("Failed to create shipment: {0}")]
    QuoteShipment(#[source] ServiceError),

    #[error("Failed to select lowest rate: {0}")]
    SelectRate(#[source] ServiceError),

    #[error("Failed to buy shipping label: {0}")]
    PurchaseLabel(#[source] ServiceError),

    #[error("Failed to insert shipping record: {0}")]
    InsertShipping(#[source] StoreError),

    #[error("Failed to insert print job: {0}")]
    InsertPrintJob(#[source] StoreError),

    #[error("Failed to read cart items: {0}")]
    ReadCart(#[source] StoreError),

    #[error("Invalid asset location: {0}")]
    InvalidAssetName(#[source] DomainError),

    #[error("Failed to read {}: {source}", path.display())]
    ReadAsset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload {key}: {source}")]
    UploadAsset {
        key: String,
        #[source]
        source: ServiceError,
    },

    #[error("Failed to insert asset file record: {0}")]
    InsertAssetFile(#[source] StoreError),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] StoreError),
}

impl FulfillmentError {
    /// Returns the name of the step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            FulfillmentError::BeginTransaction(_) => steps::STEP_BEGIN_TRANSACTION,
            FulfillmentError::InsertOrder(_) => steps::STEP_INSERT_ORDER,
            FulfillmentError::QuoteShipment(_) => steps::STEP_QUOTE_SHIPMENT,
            FulfillmentError::SelectRate(_) => steps::STEP_SELECT_RATE,
            FulfillmentError::PurchaseLabel(_) => steps::STEP_PURCHASE_LABEL,
            FulfillmentError::InsertShipping(_) => steps::STEP_INSERT_SHIPPING,
            FulfillmentError::InsertPrintJob(_) => steps::STEP_INSERT_PRINT_JOB,
            FulfillmentError::ReadCart(_) => steps::STEP_READ_CART,
            FulfillmentError::InvalidAssetName(_) => steps::STEP_RESOLVE_ASSETS,
            FulfillmentError::ReadAsset { .. } => steps::STEP_READ_ASSET,
            FulfillmentError::UploadAsset { .. } => steps::STEP_UPLOAD_ASSET,
            FulfillmentError::InsertAssetFile(_) => steps::STEP_INSERT_ASSET_FILE,
            FulfillmentError::Commit(_) => steps::STEP_COMMIT,
        }
    }

    /// Classifies the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::BeginTransaction(_) | FulfillmentError::Commit(_) => {
                ErrorKind::Infrastructure
            }
            FulfillmentError::InsertOrder(e)
            | FulfillmentError::InsertShipping(e)
            | FulfillmentError::InsertPrintJob(e)
            | FulfillmentError::ReadCart(e)
            | FulfillmentError::InsertAssetFile(e) => {
                if e.is_integrity() {
                    ErrorKind::Integrity
                } else {
                    ErrorKind::Infrastructure
                }
            }
            FulfillmentError::QuoteShipment(_)
            | FulfillmentError::SelectRate(_)
            | FulfillmentError::PurchaseLabel(_)
            | FulfillmentError::UploadAsset { .. } => ErrorKind::External,
            FulfillmentError::InvalidAssetName(_) => ErrorKind::Validation,
            FulfillmentError::ReadAsset { source, .. } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ErrorKind::Integrity
                } else {
                    ErrorKind::Infrastructure
                }
            }
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
