//! Child records written alongside an order.

use common::{Money, OrderId, PrintJobId, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// The purchased label for an order. Exactly one per committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRecord {
    pub order_id: OrderId,
    pub carrier_shipment_id: String,
    pub carrier: String,
    pub service_level: String,
    pub tracking_number: String,
    pub rate: Money,
    pub label_url: String,
}

/// Production state of a print job.
///
/// Orders only ever create `Queued` jobs; the production system owns the
/// other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrintJobStatus {
    #[default]
    Queued,
    Printing,
    Complete,
    Cancelled,
}

impl PrintJobStatus {
    /// Returns the status as stored in `print_jobs.status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintJobStatus::Queued => "queued",
            PrintJobStatus::Printing => "printing",
            PrintJobStatus::Complete => "complete",
            PrintJobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PrintJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrintJobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(PrintJobStatus::Queued),
            "printing" => Ok(PrintJobStatus::Printing),
            "complete" => Ok(PrintJobStatus::Complete),
            "cancelled" => Ok(PrintJobStatus::Cancelled),
            other => Err(DomainError::UnknownPrintJobStatus(other.to_string())),
        }
    }
}

/// A unit of physical production work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: PrintJobId,
    pub order_id: OrderId,
    pub status: PrintJobStatus,
}

/// A model file migrated to durable storage for a print job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFileRecord {
    pub session_id: SessionId,
    pub file_name: String,
    pub print_job_id: PrintJobId,
    pub quantity: u32,
}
