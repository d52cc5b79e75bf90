//! Domain ports: the contracts the sync core consumes.
//!
//! Adapters live in the outbound layer; the domain only ever sees these
//! traits. Store handles are injected explicitly at construction so tests
//! can substitute mocks or in-memory fixtures.

pub(crate) mod macros;

mod local_store;
mod remote_store;
mod store_error;

pub use local_store::LocalStore;
#[cfg(test)]
pub use local_store::MockLocalStore;
#[cfg(test)]
pub use remote_store::MockRemoteStore;
pub use remote_store::{
    RemoteCategory, RemoteProduct, RemoteProductStock, RemoteSaleLine, RemoteShopConfig,
    RemoteStore, RemoteTransaction, RemoteUser,
};
pub use store_error::StoreError;
