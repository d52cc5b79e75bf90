//! Domain types and services.
//!
//! Purpose: hold the entity model, the store ports, and the services that
//! coordinate them (sync, orders, backup). Nothing in here touches a
//! database or a network; adapters live in the outbound layer and are
//! injected through the port traits.
//!
//! Public surface:
//! - model — the seven synchronised entity types and id minting helpers.
//! - ports — `LocalStore` / `RemoteStore` contracts and `StoreError`.
//! - sync — the `SyncOrchestrator` and the pure entity mapper.
//! - orders — order placement with the stock invariant.
//! - backup — whole-store export and import.

pub mod backup;
pub mod model;
pub mod orders;
pub mod ports;
pub mod sync;
