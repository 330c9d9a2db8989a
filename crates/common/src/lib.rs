//! Shared identifiers and value types used across the fulfillment crates.

mod money;
mod types;

pub use money::{Money, ParseMoneyError};
pub use types::{OrderId, PrintJobId, SessionId};
