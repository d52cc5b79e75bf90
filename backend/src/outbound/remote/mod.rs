//! Remote store adapter over HTTP.

mod rest_store;

pub use rest_store::RestRemoteStore;
