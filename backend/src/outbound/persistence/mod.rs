//! Local-store persistence over embedded PostgreSQL.
//!
//! Diesel row structs (`models`) and table definitions (`schema`) are
//! implementation details of this layer and never cross into the domain.
//! The adapter translates between rows and domain types and maps every
//! database failure into a [`crate::domain::ports::StoreError`].

pub mod embedded;
mod models;
mod pool;
pub(crate) mod schema;

mod diesel_local_store;

pub use diesel_local_store::DieselLocalStore;
pub use embedded::{BootstrapError, EmbeddedDatabase, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
