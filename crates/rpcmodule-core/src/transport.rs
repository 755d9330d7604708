//! The `RpcTransport` trait: the provider abstraction every module talks to.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Provider health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Provider is responding normally.
    Healthy,
    /// Provider is responding but degraded.
    Degraded,
    /// Provider is not responding.
    Unhealthy,
    /// Health status is unknown (not yet checked).
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The async trait every RPC transport implements.
///
/// Transports are shared as `Arc<dyn RpcTransport>`; the module never owns
/// the connection, it only holds a reference to the current one.
///
/// The subscription methods form an optional capability. Transports that
/// cannot push notifications keep the defaults.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of JSON-RPC requests.
    ///
    /// Default implementation sends them sequentially; override for true batching.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Return the current health status of this transport.
    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Whether this transport can hold subscriptions at all.
    fn supports_subscriptions(&self) -> bool {
        false
    }

    /// Whether at least one subscription is currently live.
    fn has_subscriptions(&self) -> bool {
        false
    }

    /// Tear down every live subscription.
    async fn clear_subscriptions(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RpcId;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        sends: AtomicUsize,
    }

    #[async_trait]
    impl RpcTransport for Echo {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.sends.fetch_add(1, Ordering::Relaxed);
            Ok(JsonRpcResponse::success(req.id, Value::from(req.method)))
        }

        fn url(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn default_batch_sends_sequentially() {
        let echo = Echo { sends: AtomicUsize::new(0) };
        let reqs = vec![
            JsonRpcRequest::new(1, "eth_chainId", vec![]),
            JsonRpcRequest::new(2, "eth_gasPrice", vec![]),
        ];
        let resps = echo.send_batch(reqs).await.unwrap();
        assert_eq!(echo.sends.load(Ordering::Relaxed), 2);
        assert_eq!(resps[1].id, RpcId::Number(2));
        assert_eq!(resps[1].result, Some(Value::from("eth_gasPrice")));
    }

    #[tokio::test]
    async fn subscriptions_default_to_unsupported() {
        let echo = Echo { sends: AtomicUsize::new(0) };
        assert!(!echo.supports_subscriptions());
        assert!(!echo.has_subscriptions());
        assert!(echo.clear_subscriptions().await.is_ok());
        assert_eq!(echo.health(), HealthStatus::Unknown);
    }
}
