//! Persistence for the storefront: the product catalog and the order ledger.
//!
//! Both stores are traits with a PostgreSQL implementation for production
//! and an in-memory implementation for tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CatalogStore, OrderLedger, OrderLedgerExt};
