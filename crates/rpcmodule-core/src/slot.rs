//! The provider slot: the single holder of a module's current transport.
//!
//! Swapping the transport always tears down live subscriptions on the
//! outgoing one first, even when the incoming transport is the same instance.

use std::sync::Arc;

use crate::error::ModuleError;
use crate::registry::{ProviderRegistry, ProviderSpec};
use crate::transport::RpcTransport;

/// Holds exactly one active transport plus the registry used to resolve
/// replacements.
pub struct ProviderSlot {
    current: Arc<dyn RpcTransport>,
    registry: Arc<dyn ProviderRegistry>,
}

impl ProviderSlot {
    /// Resolve `initial` through `registry` and install it.
    pub fn new(
        initial: ProviderSpec,
        registry: Arc<dyn ProviderRegistry>,
    ) -> Result<Self, ModuleError> {
        let current = registry.resolve(initial)?;
        Ok(Self { current, registry })
    }

    /// The current transport.
    pub fn get(&self) -> Arc<dyn RpcTransport> {
        self.current.clone()
    }

    /// A second slot holding the same transport and registry.
    pub(crate) fn share(&self) -> Self {
        Self {
            current: self.current.clone(),
            registry: self.registry.clone(),
        }
    }

    /// The registry replacements are resolved through.
    pub fn registry(&self) -> Arc<dyn ProviderRegistry> {
        self.registry.clone()
    }

    /// Resolve `candidate` and swap it in.
    ///
    /// On failure the slot keeps its current transport.
    pub async fn set(&mut self, candidate: ProviderSpec) -> Result<(), ModuleError> {
        let next = self.registry.resolve(candidate)?;
        clear_live_subscriptions(&self.current).await?;
        self.install(next);
        Ok(())
    }

    /// Swap in an already resolved transport without clearing.
    pub(crate) fn install(&mut self, next: Arc<dyn RpcTransport>) {
        tracing::info!(from = %self.current.url(), to = %next.url(), "provider swapped");
        self.current = next;
    }
}

/// Tear down `transport`'s subscriptions if it holds any.
pub(crate) async fn clear_live_subscriptions(
    transport: &Arc<dyn RpcTransport>,
) -> Result<(), ModuleError> {
    if transport.supports_subscriptions() && transport.has_subscriptions() {
        tracing::warn!(
            url = %transport.url(),
            "clearing live subscriptions before provider swap"
        );
        transport.clear_subscriptions().await?;
    }
    Ok(())
}

impl std::fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("current", &self.current.url())
            .finish()
    }
}
