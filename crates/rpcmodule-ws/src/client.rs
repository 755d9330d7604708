//! WebSocket JSON-RPC transport with subscription management.
//!
//! A background task owns the connection. Callers talk to it over a
//! command channel; responses are matched back by a wire id the task
//! assigns, so callers with overlapping request ids can share one
//! connection. A dropped connection is not re-established: pending and
//! later requests fail and all subscriptions are discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use rpcmodule_core::error::TransportError;
use rpcmodule_core::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use rpcmodule_core::transport::{HealthStatus, RpcTransport};

use crate::subscriptions::{SubscriptionId, SubscriptionManager};

type Reply = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// Configuration for [`WsTransport`].
#[derive(Debug, Clone)]
pub struct WsTransportConfig {
    /// How long to wait for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// How long a request may wait for its response.
    pub request_timeout: Duration,
}

impl Default for WsTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: Reply },
    Close,
}

/// WebSocket JSON-RPC transport.
pub struct WsTransport {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    state: Arc<AtomicU8>,
    request_timeout: Duration,
    next_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
}

impl WsTransport {
    /// Start connecting to `url` on the current tokio runtime.
    ///
    /// Returns immediately; requests sent before the handshake completes
    /// are queued. Fails if called outside a runtime.
    pub fn new(url: impl Into<String>, config: WsTransportConfig) -> Result<Self, TransportError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::WebSocket(format!("no tokio runtime: {e}")))?;

        let url = url.into();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionManager::new();
        let state = Arc::new(AtomicU8::new(CONNECTING));
        let in_flight = Arc::new(AtomicUsize::new(0));

        handle.spawn(ws_task(
            url.clone(),
            cmd_rx,
            subscriptions.clone(),
            state.clone(),
            Pending::new(in_flight.clone()),
            config.connect_timeout,
        ));

        Ok(Self {
            url,
            cmd_tx,
            subscriptions,
            state,
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
            in_flight,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, WsTransportConfig::default())
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(JsonRpcRequest::new(id, method, params))
            .await?
            .into_result()
            .map_err(TransportError::Rpc)
    }

    /// Open a subscription.
    ///
    /// `kind` is the subscription type (e.g. `"newHeads"`, `"logs"`).
    pub async fn subscribe(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<Value>), TransportError> {
        let result = self
            .request(
                "eth_subscribe",
                std::iter::once(Value::String(kind.to_string()))
                    .chain(params)
                    .collect(),
            )
            .await?;
        let id = result
            .as_str()
            .map(|s| SubscriptionId(s.to_string()))
            .ok_or_else(|| TransportError::Other(format!("unexpected subscription id {result}")))?;
        tracing::debug!(url = %self.url, kind, id = %id, "subscribed");
        let rx = self.subscriptions.register(id.clone(), kind.to_string());
        Ok((id, rx))
    }

    /// Close a subscription. The local entry is removed even if the node
    /// rejects the request.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, TransportError> {
        self.subscriptions.remove(id);
        let result = self
            .request("eth_unsubscribe", vec![Value::String(id.0.clone())])
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Requests written to the socket that are still awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        match time::timeout(self.request_timeout, rx).await {
            Ok(reply) => reply.map_err(|_| TransportError::WebSocket("WS response dropped".into()))?,
            Err(_) => Err(TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }

    fn health(&self) -> HealthStatus {
        match self.state.load(Ordering::Relaxed) {
            OPEN => HealthStatus::Healthy,
            CLOSED => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn supports_subscriptions(&self) -> bool {
        true
    }

    fn has_subscriptions(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// `eth_unsubscribe` every active subscription. All are removed
    /// locally; the first node-side failure is returned.
    async fn clear_subscriptions(&self) -> Result<(), TransportError> {
        let mut first_err = None;
        for id in self.subscriptions.ids() {
            if let Err(e) = self.unsubscribe(&id).await {
                tracing::warn!(url = %self.url, id = %id, error = %e, "eth_unsubscribe failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &self.url)
            .field("health", &self.health())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// In-flight requests of the background task, keyed by wire id.
///
/// The count is mirrored into a counter shared with the transport and is
/// updated before a reply is delivered.
struct Pending {
    map: HashMap<u64, (RpcId, Reply)>,
    in_flight: Arc<AtomicUsize>,
}

impl Pending {
    fn new(in_flight: Arc<AtomicUsize>) -> Self {
        Self {
            map: HashMap::new(),
            in_flight,
        }
    }

    fn publish(&self) {
        self.in_flight.store(self.map.len(), Ordering::Relaxed);
    }

    fn insert(&mut self, wire_id: u64, caller_id: RpcId, tx: Reply) {
        self.map.insert(wire_id, (caller_id, tx));
        self.publish();
    }

    fn remove(&mut self, wire_id: u64) -> Option<(RpcId, Reply)> {
        let entry = self.map.remove(&wire_id);
        self.publish();
        entry
    }

    /// Forget requests whose caller stopped waiting (timed out or dropped).
    fn sweep(&mut self) {
        let before = self.map.len();
        self.map.retain(|_, (_, tx)| !tx.is_closed());
        if self.map.len() != before {
            tracing::debug!(dropped = before - self.map.len(), "swept abandoned WS requests");
            self.publish();
        }
    }

    /// Fail every remaining request.
    fn fail_all(&mut self, reason: &str) {
        let entries: Vec<_> = self.map.drain().collect();
        self.publish();
        for (_, (_, tx)) in entries {
            let _ = tx.send(Err(TransportError::WebSocket(reason.into())));
        }
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(
    url: String,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    subscriptions: SubscriptionManager,
    state: Arc<AtomicU8>,
    mut pending: Pending,
    connect_timeout: Duration,
) {
    tracing::info!(url = %url, "connecting via WebSocket");

    let ws_stream = match time::timeout(connect_timeout, tokio_tungstenite::connect_async(&url)).await {
        Ok(Ok((ws_stream, _))) => ws_stream,
        Ok(Err(e)) => {
            tracing::warn!(url = %url, error = %e, "WS connect failed");
            state.store(CLOSED, Ordering::Relaxed);
            return;
        }
        Err(_) => {
            tracing::warn!(url = %url, "WS connect timed out");
            state.store(CLOSED, Ordering::Relaxed);
            return;
        }
    };
    state.store(OPEN, Ordering::Relaxed);
    let (mut sink, mut stream) = ws_stream.split();

    let mut next_wire_id = 1u64;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    Some(WsCommand::Send { mut req, tx }) => {
                        pending.sweep();
                        let wire_id = next_wire_id;
                        next_wire_id += 1;
                        let caller_id = std::mem::replace(&mut req.id, RpcId::Number(wire_id));
                        let msg = match serde_json::to_string(&req) {
                            Ok(msg) => msg,
                            Err(e) => {
                                let _ = tx.send(Err(e.into()));
                                continue;
                            }
                        };
                        pending.insert(wire_id, caller_id, tx);
                        if let Err(e) = sink.send(Message::Text(msg.into())).await {
                            tracing::warn!(url = %url, error = %e, "WS send failed");
                            break;
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break,
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "WS receive error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_message(text.as_str(), &mut pending, &subscriptions);
                    }
                    Some(Ok(Message::Close(_))) => break,
                    _ => {}
                }
            }
        }
    }

    state.store(CLOSED, Ordering::Relaxed);
    if !subscriptions.is_empty() {
        tracing::warn!(url = %url, active = subscriptions.len(), "WS closed, dropping subscriptions");
        subscriptions.clear();
    }
    pending.fail_all("connection closed");
    tracing::info!(url = %url, "WS task finished");
}

fn handle_message(
    text: &str,
    pending: &mut Pending,
    subscriptions: &SubscriptionManager,
) {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return;
    };

    if val.get("method").and_then(|m| m.as_str()) == Some("eth_subscription") {
        if let Some(params) = val.get("params") {
            if let Some(id) = params["subscription"].as_str() {
                subscriptions.dispatch(&SubscriptionId(id.to_string()), params["result"].clone());
            }
        }
        return;
    }

    let Ok(mut resp) = serde_json::from_value::<JsonRpcResponse>(val) else {
        tracing::debug!("ignoring unrecognised WS message");
        return;
    };
    let Some(wire_id) = resp.id.as_u64() else {
        return;
    };
    if let Some((caller_id, tx)) = pending.remove(wire_id) {
        resp.id = caller_id;
        let _ = tx.send(Ok(resp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// A one-connection node: answers every request except `test_silent`,
    /// and pushes a notification for `0xsub1` before answering `test_emit`.
    async fn spawn_node() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let req: Value = serde_json::from_str(text.as_str()).unwrap();
                let method = req["method"].as_str().unwrap_or_default().to_string();
                if method == "test_silent" {
                    continue;
                }
                if method == "test_emit" {
                    let note = json!({
                        "jsonrpc": "2.0",
                        "method": "eth_subscription",
                        "params": { "subscription": "0xsub1", "result": { "number": "0x10" } }
                    });
                    ws.send(Message::Text(note.to_string().into())).await.unwrap();
                }
                let result = match method.as_str() {
                    "eth_subscribe" => json!("0xsub1"),
                    "eth_unsubscribe" => json!(true),
                    _ => json!({ "echo": req["id"].clone() }),
                };
                let resp = json!({ "jsonrpc": "2.0", "id": req["id"], "result": result });
                ws.send(Message::Text(resp.to_string().into())).await.unwrap();
            }
        });
        format!("ws://{addr}")
    }

    #[test]
    fn requires_runtime() {
        let err = WsTransport::default_for("ws://localhost:8546").unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)));
    }

    #[tokio::test]
    async fn restores_caller_ids() {
        let t = WsTransport::default_for(spawn_node().await).unwrap();

        let a = t.send(JsonRpcRequest::new(7, "eth_chainId", vec![])).await.unwrap();
        let b = t.send(JsonRpcRequest::new(7, "eth_chainId", vec![])).await.unwrap();

        assert_eq!(a.id, RpcId::Number(7));
        assert_eq!(b.id, RpcId::Number(7));
        // The node saw distinct wire ids.
        assert_ne!(a.result, b.result);
        assert_eq!(t.health(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn subscribe_dispatch_and_clear() {
        let t = WsTransport::default_for(spawn_node().await).unwrap();
        assert!(t.supports_subscriptions());
        assert!(!t.has_subscriptions());

        let (id, mut rx) = t.subscribe("newHeads", vec![]).await.unwrap();
        assert_eq!(id, SubscriptionId("0xsub1".into()));
        assert!(t.has_subscriptions());

        t.send(JsonRpcRequest::new(1, "test_emit", vec![])).await.unwrap();
        assert_eq!(rx.recv().await.unwrap()["number"], "0x10");

        t.clear_subscriptions().await.unwrap();
        assert!(!t.has_subscriptions());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn timed_out_request_is_forgotten() {
        let config = WsTransportConfig {
            request_timeout: Duration::from_millis(100),
            ..WsTransportConfig::default()
        };
        let t = WsTransport::new(spawn_node().await, config).unwrap();
        t.send(JsonRpcRequest::new(1, "eth_chainId", vec![])).await.unwrap();

        let err = t
            .send(JsonRpcRequest::new(1, "test_silent", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { ms: 100 }));
        assert_eq!(t.pending_requests(), 1);

        t.send(JsonRpcRequest::new(2, "eth_chainId", vec![])).await.unwrap();
        assert_eq!(t.pending_requests(), 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let t = WsTransport::default_for(url).unwrap();
        let err = t
            .send(JsonRpcRequest::new(1, "eth_chainId", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)));
        assert_eq!(t.health(), HealthStatus::Unhealthy);
    }
}
