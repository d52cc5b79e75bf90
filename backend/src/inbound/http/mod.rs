//! Actix adapters translating HTTP requests into domain calls.

pub mod health;
pub mod sync;
