//! Outbound adapters implementing the domain store ports.
//!
//! - **persistence**: the embedded PostgreSQL local store via Diesel with
//!   `diesel-async` and `bb8` pooling, plus database bootstrap.
//! - **remote**: the reqwest-backed remote store adapter.
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations; no business logic lives here.

pub mod persistence;
pub mod remote;
