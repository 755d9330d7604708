//! Error types for transports and for the module façade.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this is a node-side execution error.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors raised by an [`RpcModule`](crate::module::RpcModule) and its parts.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A required dependency was not supplied at construction.
    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),

    /// A provider specifier could not be turned into a transport.
    #[error("unresolvable provider: {0}")]
    UnresolvableProvider(String),

    /// No method model is registered under this name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A method name collides with a plain member of the module.
    #[error("method name '{0}' collides with an existing module member")]
    DuplicateMethod(String),

    /// The caller passed the wrong number of arguments.
    #[error("invalid number of parameters for '{method}': expected {expected}, got {got}")]
    InvalidArgumentCount {
        method: String,
        expected: usize,
        got: usize,
    },

    /// An input or output formatter rejected its value.
    #[error("formatting error: {reason}")]
    Formatting { reason: String },

    /// An extension referenced a formatter name that is not registered.
    #[error("unknown formatter: {0}")]
    UnknownFormatter(String),

    /// A batch response did not contain an entry for one of its requests.
    #[error("batch response missing for request id {id}")]
    BatchResponseMissing { id: u64 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ModuleError {
    pub(crate) fn formatting(reason: impl Into<String>) -> Self {
        Self::Formatting {
            reason: reason.into(),
        }
    }
}
