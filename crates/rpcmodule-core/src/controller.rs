//! Method execution: the controller that runs a method model over a transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ModuleError, TransportError};
use crate::method::MethodModel;
use crate::module::RpcModule;
use crate::transport::RpcTransport;

/// Local accounts available to the controller (e.g. for signing decisions).
pub trait Accounts: Send + Sync {
    /// The account used when a call omits its sender.
    fn default_account(&self) -> Option<String>;

    /// Whether `address` is managed locally.
    fn has_account(&self, address: &str) -> bool;
}

/// Executes method models.
#[async_trait]
pub trait MethodController: Send + Sync {
    async fn execute(
        &self,
        model: MethodModel,
        transport: Arc<dyn RpcTransport>,
        accounts: Option<Arc<dyn Accounts>>,
        module: &RpcModule,
    ) -> Result<Value, ModuleError>;
}

/// Default controller: format, send one request, format the result.
#[derive(Debug)]
pub struct JsonRpcController {
    next_id: AtomicU64,
}

impl JsonRpcController {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for JsonRpcController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MethodController for JsonRpcController {
    async fn execute(
        &self,
        mut model: MethodModel,
        transport: Arc<dyn RpcTransport>,
        _accounts: Option<Arc<dyn Accounts>>,
        module: &RpcModule,
    ) -> Result<Value, ModuleError> {
        model.before_execution(module)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = model.to_request(id);
        tracing::debug!(id, method = %req.method, url = %transport.url(), "sending request");

        let resp = transport.send(req).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        model.after_execution(result)
    }
}
