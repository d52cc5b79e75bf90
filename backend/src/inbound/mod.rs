//! Inbound adapters: surfaces through which the outside world drives the
//! domain.

pub mod http;
