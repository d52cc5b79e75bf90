//! Offline-first point-of-sale backend.
//!
//! The local PostgreSQL store is the source of truth; a background
//! orchestrator reconciles it with a remote REST store in both directions.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI.
pub use doc::ApiDoc;
