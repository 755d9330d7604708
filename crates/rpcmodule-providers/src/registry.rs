//! Scheme-based provider registry.

use std::sync::Arc;

use rpcmodule_core::error::ModuleError;
use rpcmodule_core::registry::{ProviderRegistry, ProviderSpec};
use rpcmodule_core::transport::RpcTransport;
use rpcmodule_http::{HttpTransport, HttpTransportConfig};
use rpcmodule_ws::{WsTransport, WsTransportConfig};

/// Environment variable holding the ambient provider URL.
pub const AMBIENT_PROVIDER_VAR: &str = "RPCMODULE_PROVIDER";

/// Configuration for [`DefaultProviderRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub http: HttpTransportConfig,
    pub ws: WsTransportConfig,
    /// Environment variable consulted by `detect_ambient`.
    pub ambient_var: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            http: HttpTransportConfig::default(),
            ws: WsTransportConfig::default(),
            ambient_var: AMBIENT_PROVIDER_VAR.to_string(),
        }
    }
}

/// Builds HTTP and WebSocket transports from endpoint URLs.
#[derive(Debug, Clone, Default)]
pub struct DefaultProviderRegistry {
    config: RegistryConfig,
}

impl DefaultProviderRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }

    fn from_url(&self, url: &str) -> Result<Arc<dyn RpcTransport>, ModuleError> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();

        let transport: Arc<dyn RpcTransport> = match scheme.as_str() {
            "http" | "https" => Arc::new(HttpTransport::new(url, self.config.http.clone())?),
            "ws" | "wss" => Arc::new(WsTransport::new(url, self.config.ws.clone())?),
            _ => {
                return Err(ModuleError::UnresolvableProvider(format!(
                    "unsupported endpoint '{url}', expected http(s):// or ws(s)://"
                )))
            }
        };
        tracing::debug!(url, scheme = %scheme, "resolved provider");
        Ok(transport)
    }
}

impl ProviderRegistry for DefaultProviderRegistry {
    fn detect_ambient(&self) -> Option<Arc<dyn RpcTransport>> {
        let url = std::env::var(&self.config.ambient_var).ok()?;
        match self.from_url(url.trim()) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(var = %self.config.ambient_var, error = %e, "ignoring ambient provider");
                None
            }
        }
    }

    fn resolve(&self, spec: ProviderSpec) -> Result<Arc<dyn RpcTransport>, ModuleError> {
        match spec {
            ProviderSpec::Transport(t) => Ok(t),
            ProviderSpec::Url(url) => self.from_url(&url),
        }
    }

    fn known_kinds(&self) -> Vec<&'static str> {
        vec!["HttpProvider", "WebsocketProvider"]
    }
}
