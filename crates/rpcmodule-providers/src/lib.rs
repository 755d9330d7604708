//! rpcmodule-providers — the default provider registry.
//!
//! Resolves endpoint URLs by scheme:
//!
//! | scheme            | transport                     |
//! |-------------------|-------------------------------|
//! | `http`, `https`   | [`HttpTransport`]             |
//! | `ws`, `wss`       | [`WsTransport`]               |
//!
//! The ambient provider is read from the `RPCMODULE_PROVIDER` environment
//! variable.
//!
//! # Quick start
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpcmodule_core::RpcModule;
//! use rpcmodule_providers::DefaultProviderRegistry;
//!
//! let web3 = RpcModule::builder()
//!     .provider("https://eth.llamarpc.com")
//!     .registry(Arc::new(DefaultProviderRegistry::default()))
//!     .build()?;
//! # Ok::<(), rpcmodule_core::ModuleError>(())
//! ```

pub mod registry;

pub use registry::{DefaultProviderRegistry, RegistryConfig, AMBIENT_PROVIDER_VAR};
pub use rpcmodule_http::HttpTransport;
pub use rpcmodule_ws::WsTransport;
