//! rpcmodule-core — a dynamic JSON-RPC module façade.
//!
//! # Overview
//!
//! An [`RpcModule`] holds the current transport, a table of RPC methods and
//! any child namespaces added at runtime. The core crate defines:
//!
//! - [`RpcTransport`]: the async trait every provider implements
//! - [`ProviderRegistry`] / [`ProviderSlot`]: provider resolution and hot-swap
//! - [`MethodDescriptor`] / [`MethodModel`] / [`MethodModelFactory`]: method tables and per-call models
//! - [`RpcModule`]: member dispatch, extension and provider propagation
//! - [`MethodController`]: executes a method model over a transport
//! - [`batch`] module: batched execution
//! - [`formatters`] module: standard input/output formatters
//! - [`ModuleError`] / [`TransportError`]: error types

pub mod batch;
pub mod config;
pub mod controller;
pub mod error;
pub mod extension;
pub mod factory;
pub mod formatters;
pub mod method;
pub mod module;
pub mod registry;
pub mod request;
pub mod slot;
pub mod transport;

pub use batch::{BatchHandle, BatchPackage, BatchRequest, JsonRpcBatchPackage, MethodRequest};
pub use config::ModuleConfig;
pub use controller::{Accounts, JsonRpcController, MethodController};
pub use error::{ModuleError, TransportError};
pub use extension::{ExtensionConfig, ExtensionSpec, MethodConfig};
pub use factory::MethodModelFactory;
pub use formatters::{Formatters, InputFormatter, OutputFormatter};
pub use method::{MethodDescriptor, MethodModel};
pub use module::{BoundMethod, Member, RpcModule, RpcModuleBuilder};
pub use registry::{PassthroughRegistry, ProviderRegistry, ProviderSpec};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use slot::ProviderSlot;
pub use transport::{HealthStatus, RpcTransport};
