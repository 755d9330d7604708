//! rpcmodule-ws — WebSocket JSON-RPC transport.
//!
//! # Features
//! - Request multiplexing over a single connection
//! - Subscription management (`eth_subscribe` / `eth_unsubscribe`)
//! - Subscription teardown when the owning module swaps providers

pub mod client;
pub mod subscriptions;

pub use client::{WsTransport, WsTransportConfig};
pub use subscriptions::{SubscriptionId, SubscriptionManager};
