//! Provider resolution: turning a specifier into a live transport.

use std::fmt;
use std::sync::Arc;

use crate::error::ModuleError;
use crate::transport::RpcTransport;

/// Something a registry can turn into a transport.
#[derive(Clone)]
pub enum ProviderSpec {
    /// An already constructed transport, used as is.
    Transport(Arc<dyn RpcTransport>),
    /// An endpoint the registry knows how to connect to (e.g. `https://…`, `wss://…`).
    Url(String),
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(t) => f.debug_tuple("Transport").field(&t.url()).finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

impl From<Arc<dyn RpcTransport>> for ProviderSpec {
    fn from(transport: Arc<dyn RpcTransport>) -> Self {
        Self::Transport(transport)
    }
}

impl From<&str> for ProviderSpec {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for ProviderSpec {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

/// The set of known transport constructors.
pub trait ProviderRegistry: Send + Sync {
    /// Return an injected/ambient transport if the environment offers one.
    fn detect_ambient(&self) -> Option<Arc<dyn RpcTransport>>;

    /// Resolve a specifier into a transport.
    ///
    /// Fails with [`ModuleError::UnresolvableProvider`] when no constructor
    /// accepts the specifier.
    fn resolve(&self, spec: ProviderSpec) -> Result<Arc<dyn RpcTransport>, ModuleError>;

    /// Names of the transport kinds this registry can build.
    fn known_kinds(&self) -> Vec<&'static str>;
}

/// A registry that only accepts ready-made transports.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRegistry;

impl ProviderRegistry for PassthroughRegistry {
    fn detect_ambient(&self) -> Option<Arc<dyn RpcTransport>> {
        None
    }

    fn resolve(&self, spec: ProviderSpec) -> Result<Arc<dyn RpcTransport>, ModuleError> {
        match spec {
            ProviderSpec::Transport(t) => Ok(t),
            ProviderSpec::Url(url) => Err(ModuleError::UnresolvableProvider(format!(
                "no transport constructor registered for '{url}'"
            ))),
        }
    }

    fn known_kinds(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
