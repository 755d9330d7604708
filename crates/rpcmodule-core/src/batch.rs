//! Batch requests: collect formatted method calls and submit them in one round trip.
//!
//! A batch captures the transport that was current when it was created; a
//! later provider swap on the module does not redirect it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ModuleError, TransportError};
use crate::method::MethodModel;
use crate::transport::RpcTransport;

/// A method call whose arguments have already been formatted, ready to be
/// sent as part of a batch.
#[derive(Debug, Clone)]
pub struct MethodRequest {
    model: MethodModel,
}

impl MethodRequest {
    pub(crate) fn new(model: MethodModel) -> Self {
        Self { model }
    }

    pub fn method_model(&self) -> &MethodModel {
        &self.model
    }
}

/// A batch under construction.
#[async_trait]
pub trait BatchHandle: Send + Sync {
    fn add(&mut self, request: MethodRequest);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submit every queued request. Results come back in insertion order;
    /// each entry carries its own success or failure.
    async fn execute(&mut self) -> Result<Vec<Result<Value, ModuleError>>, ModuleError>;
}

/// Creates batches bound to a transport.
pub trait BatchPackage: Send + Sync {
    fn create_batch(&self, transport: Arc<dyn RpcTransport>) -> Box<dyn BatchHandle>;
}

/// The default package, producing [`BatchRequest`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRpcBatchPackage;

impl BatchPackage for JsonRpcBatchPackage {
    fn create_batch(&self, transport: Arc<dyn RpcTransport>) -> Box<dyn BatchHandle> {
        Box::new(BatchRequest::new(transport))
    }
}

/// JSON-RPC batch sent through [`RpcTransport::send_batch`].
pub struct BatchRequest {
    transport: Arc<dyn RpcTransport>,
    requests: Vec<MethodRequest>,
}

impl BatchRequest {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            requests: Vec::new(),
        }
    }

    /// The transport this batch will be sent through.
    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }
}

#[async_trait]
impl BatchHandle for BatchRequest {
    fn add(&mut self, request: MethodRequest) {
        self.requests.push(request);
    }

    fn len(&self) -> usize {
        self.requests.len()
    }

    async fn execute(&mut self) -> Result<Vec<Result<Value, ModuleError>>, ModuleError> {
        if self.requests.is_empty() {
            return Ok(Vec::new());
        }

        // Ids are positional (1-based) within one batch.
        let ids: Vec<u64> = (1..=self.requests.len() as u64).collect();
        let wire: Vec<_> = ids
            .iter()
            .zip(&self.requests)
            .map(|(id, r)| r.model.to_request(*id))
            .collect();
        tracing::debug!(size = wire.len(), url = %self.transport.url(), "sending batch");

        // A failed send keeps the queue intact for a retry.
        let responses = self.transport.send_batch(wire).await?;
        let requests = std::mem::take(&mut self.requests);

        // Nodes may answer a batch out of order.
        let mut by_id: HashMap<u64, _> = responses
            .into_iter()
            .filter_map(|resp| resp.id.as_u64().map(|id| (id, resp)))
            .collect();

        let results = ids
            .into_iter()
            .zip(requests)
            .map(|(id, request)| {
                let resp = by_id
                    .remove(&id)
                    .ok_or(ModuleError::BatchResponseMissing { id })?;
                let value = resp.into_result().map_err(TransportError::Rpc)?;
                request.model.after_execution(value)
            })
            .collect();
        Ok(results)
    }
}

impl std::fmt::Debug for BatchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRequest")
            .field("transport", &self.transport.url())
            .field("requests", &self.requests.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::Formatters;
    use crate::method::MethodDescriptor;
    use crate::request::{JsonRpcRequest, JsonRpcResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first batch with an HTTP error, then answers every request
    /// with its own id.
    struct Flaky {
        batches: AtomicUsize,
    }

    #[async_trait]
    impl RpcTransport for Flaky {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Ok(JsonRpcResponse::success(req.id, Value::Null))
        }

        async fn send_batch(
            &self,
            reqs: Vec<JsonRpcRequest>,
        ) -> Result<Vec<JsonRpcResponse>, TransportError> {
            if self.batches.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(TransportError::Http("HTTP 503: unavailable".into()));
            }
            Ok(reqs
                .into_iter()
                .map(|r| JsonRpcResponse::success(r.id, json!(r.method)))
                .collect())
        }

        fn url(&self) -> &str {
            "mock://flaky"
        }
    }

    fn request(call: &str) -> MethodRequest {
        let model = MethodModel::new(
            Arc::new(MethodDescriptor::new(call)),
            Arc::new(Formatters::new()),
        );
        MethodRequest::new(model)
    }

    #[tokio::test]
    async fn failed_send_keeps_requests_queued() {
        let transport = Arc::new(Flaky {
            batches: AtomicUsize::new(0),
        });
        let mut batch = BatchRequest::new(transport.clone());
        batch.add(request("eth_chainId"));
        batch.add(request("eth_gasPrice"));

        let err = batch.execute().await.unwrap_err();
        assert!(matches!(err, ModuleError::Transport(TransportError::Http(_))));
        assert_eq!(batch.len(), 2);

        let results = batch.execute().await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(*results[0].as_ref().unwrap(), json!("eth_chainId"));
        assert_eq!(*results[1].as_ref().unwrap(), json!("eth_gasPrice"));
        assert!(batch.is_empty());
        assert_eq!(transport.batches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_batch_sends_nothing() {
        let transport = Arc::new(Flaky {
            batches: AtomicUsize::new(0),
        });
        let mut batch = BatchRequest::new(transport.clone());
        assert!(batch.execute().await.unwrap().is_empty());
        assert_eq!(transport.batches.load(Ordering::SeqCst), 0);
    }
}
