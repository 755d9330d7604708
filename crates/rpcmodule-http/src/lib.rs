//! rpcmodule-http — JSON-RPC over HTTP POST.
//!
//! Single requests are posted as one JSON object; batches are posted as one
//! JSON array in a single HTTP call.

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
