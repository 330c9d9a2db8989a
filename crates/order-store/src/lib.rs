//! Order repository for the fulfillment backend.
//!
//! All writes of an order run happen through one [`OrderTransaction`]
//! opened by an [`OrderStore`]. Nothing written through the handle is
//! visible to other readers until [`OrderTransaction::commit`].
//!
//! Two implementations are provided: [`PostgresOrderStore`] for production
//! and [`InMemoryOrderStore`] for tests, which can be told to fail any single
//! operation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Operation, Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::{PostgresOrderStore, PostgresTransaction};
pub use store::{OrderStore, OrderTransaction};
