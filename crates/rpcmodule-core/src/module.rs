//! The module façade: a provider slot, a method table and child namespaces.
//!
//! Member access goes through [`RpcModule::member`], which checks the method
//! table first and falls back to the module's plain members:
//!
//! - configuration keys (`defaultBlock`, `defaultAccount`, …)
//! - user fields set with [`RpcModule::set_field`]
//! - child namespaces created by [`RpcModule::extend`]
//! - the built-in API members (`currentProvider`, `setProvider`, …)
//!
//! A method whose name is also a plain member is reported as
//! [`ModuleError::DuplicateMethod`] when accessed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpcmodule_core::{ExtensionSpec, MethodDescriptor, PassthroughRegistry, RpcModule, RpcTransport};
//! use rpcmodule_core::formatters::hex_to_number;
//!
//! # async fn run(transport: Arc<dyn RpcTransport>) -> Result<(), rpcmodule_core::ModuleError> {
//! let mut web3 = RpcModule::builder()
//!     .provider(transport)
//!     .registry(Arc::new(PassthroughRegistry))
//!     .build()?;
//!
//! web3.extend(
//!     ExtensionSpec::new().namespace("eth").method(
//!         MethodDescriptor::new("eth_blockNumber")
//!             .name("getBlockNumber")
//!             .output_formatter(Arc::new(hex_to_number)),
//!     ),
//! )?;
//!
//! let eth = web3.namespace("eth").expect("registered above");
//! let block = eth.call("getBlockNumber", vec![]).await?;
//! println!("block {block}");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::batch::{BatchHandle, BatchPackage, MethodRequest};
use crate::config::ModuleConfig;
use crate::controller::{Accounts, JsonRpcController, MethodController};
use crate::error::ModuleError;
use crate::extension::{ExtensionConfig, ExtensionSpec};
use crate::factory::MethodModelFactory;
use crate::formatters::Formatters;
use crate::method::{MethodDescriptor, MethodModel};
use crate::registry::{ProviderRegistry, ProviderSpec};
use crate::slot::{clear_live_subscriptions, ProviderSlot};
use crate::transport::RpcTransport;

/// Built-in API member names of every module.
pub const API_MEMBERS: &[&str] = &[
    "currentProvider",
    "givenProvider",
    "providers",
    "BatchRequest",
    "extend",
    "setProvider",
    "clearSubscriptions",
];

/// Result of a member lookup.
pub enum Member<'a> {
    /// A callable RPC method bound to the module.
    Method(BoundMethod<'a>),
    /// A child namespace.
    Namespace(&'a RpcModule),
    /// A data member (configuration key, user field or provider info).
    Field(Value),
    /// A built-in operation, reachable through the matching Rust method.
    Api(&'static str),
}

impl std::fmt::Debug for Member<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Method(m) => f.debug_tuple("Method").field(m.method_model()).finish(),
            Self::Namespace(ns) => f.debug_tuple("Namespace").field(&ns.namespace_name()).finish(),
            Self::Field(v) => f.debug_tuple("Field").field(v).finish(),
            Self::Api(name) => f.debug_tuple("Api").field(name).finish(),
        }
    }
}

/// A method model bound to the module it was looked up on.
pub struct BoundMethod<'a> {
    module: &'a RpcModule,
    model: MethodModel,
}

impl BoundMethod<'_> {
    /// The underlying model, for introspection.
    pub fn method_model(&self) -> &MethodModel {
        &self.model
    }

    /// Format `args` into a request that can be added to a batch.
    pub fn request(&self, args: Vec<Value>) -> Result<MethodRequest, ModuleError> {
        let mut model = self.model.clone();
        model.set_arguments(args);
        model.before_execution(self.module)?;
        Ok(MethodRequest::new(model))
    }

    /// Execute through the module's controller and current provider.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, ModuleError> {
        let mut model = self.model.clone();
        model.set_arguments(args);
        self.module
            .controller
            .execute(
                model,
                self.module.current_provider(),
                self.module.accounts.clone(),
                self.module,
            )
            .await
    }
}

/// The JSON-RPC module façade.
pub struct RpcModule {
    namespace: Option<String>,
    provider: ProviderSlot,
    methods: MethodModelFactory,
    controller: Arc<dyn MethodController>,
    accounts: Option<Arc<dyn Accounts>>,
    batch: Option<Arc<dyn BatchPackage>>,
    config: ModuleConfig,
    fields: BTreeMap<String, Value>,
    extended: Vec<RpcModule>,
}

impl RpcModule {
    pub fn builder() -> RpcModuleBuilder {
        RpcModuleBuilder::new()
    }

    /// Look up `name`: an RPC method if one is registered, otherwise a plain
    /// member. `Ok(None)` means the module has no such member.
    pub fn member(&self, name: &str) -> Result<Option<Member<'_>>, ModuleError> {
        if !self.methods.has_model(name) {
            return Ok(self.plain_member(name));
        }
        if self.has_own_member(name) {
            return Err(ModuleError::DuplicateMethod(name.to_string()));
        }
        let model = self.methods.create_model(name)?;
        tracing::debug!(method = name, call = model.call(), "resolved method");
        Ok(Some(Member::Method(BoundMethod {
            module: self,
            model,
        })))
    }

    /// Look up `name` and require it to be an RPC method.
    pub fn method(&self, name: &str) -> Result<BoundMethod<'_>, ModuleError> {
        match self.member(name)? {
            Some(Member::Method(method)) => Ok(method),
            _ => Err(ModuleError::UnknownMethod(name.to_string())),
        }
    }

    /// Shorthand for `self.method(name)?.call(args)`.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, ModuleError> {
        self.method(name)?.call(args).await
    }

    fn plain_member(&self, name: &str) -> Option<Member<'_>> {
        if let Some(ns) = self.namespace(name) {
            return Some(Member::Namespace(ns));
        }
        if let Some(value) = self.fields.get(name) {
            return Some(Member::Field(value.clone()));
        }
        if ModuleConfig::KEYS.contains(&name) {
            return serde_json::to_value(&self.config)
                .ok()
                .and_then(|mut cfg| cfg.get_mut(name).map(Value::take))
                .map(Member::Field);
        }
        match name {
            "currentProvider" => Some(Member::Field(Value::String(
                self.provider.get().url().to_string(),
            ))),
            "givenProvider" => Some(Member::Field(
                self.provider
                    .registry()
                    .detect_ambient()
                    .map(|t| Value::String(t.url().to_string()))
                    .unwrap_or(Value::Null),
            )),
            "providers" => Some(Member::Field(Value::from(
                self.provider.registry().known_kinds(),
            ))),
            _ => API_MEMBERS
                .iter()
                .copied()
                .find(|api| *api == name)
                .map(Member::Api),
        }
    }

    fn has_own_member(&self, name: &str) -> bool {
        API_MEMBERS.contains(&name)
            || ModuleConfig::KEYS.contains(&name)
            || self.fields.contains_key(name)
            || self.namespace(name).is_some()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.has_model(name)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.names()
    }

    /// The formatter table shared by this module tree.
    pub fn formatters(&self) -> &Formatters {
        self.methods.formatters()
    }

    /// Set a plain data member.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ModuleConfig {
        &mut self.config
    }

    pub fn accounts(&self) -> Option<Arc<dyn Accounts>> {
        self.accounts.clone()
    }

    /// The namespace this module was created under, `None` for the root.
    pub fn namespace_name(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn namespace(&self, name: &str) -> Option<&RpcModule> {
        self.extended
            .iter()
            .find(|child| child.namespace.as_deref() == Some(name))
    }

    pub fn namespace_mut(&mut self, name: &str) -> Option<&mut RpcModule> {
        self.extended
            .iter_mut()
            .find(|child| child.namespace.as_deref() == Some(name))
    }

    /// Child modules in the order they were created.
    pub fn extensions(&self) -> &[RpcModule] {
        &self.extended
    }

    pub fn current_provider(&self) -> Arc<dyn RpcTransport> {
        self.provider.get()
    }

    /// Swap the provider here and in every child namespace.
    ///
    /// The specifier is resolved once and the whole tree ends up sharing the
    /// resolved transport. Every distinct outgoing transport has its live
    /// subscriptions cleared, in creation order, before any slot changes; if
    /// resolution or a clear fails, no module in the tree is touched.
    pub async fn set_provider(&mut self, provider: ProviderSpec) -> Result<(), ModuleError> {
        let next = self.provider.registry().resolve(provider)?;

        let mut outgoing = Vec::new();
        self.collect_providers(&mut outgoing);
        for transport in &outgoing {
            clear_live_subscriptions(transport).await?;
        }

        self.install_provider(&next);
        Ok(())
    }

    /// Current transports of this module and its children, depth first,
    /// each instance listed once.
    fn collect_providers(&self, out: &mut Vec<Arc<dyn RpcTransport>>) {
        let current = self.provider.get();
        if !out.iter().any(|seen| Arc::ptr_eq(seen, &current)) {
            out.push(current);
        }
        for child in &self.extended {
            child.collect_providers(out);
        }
    }

    fn install_provider(&mut self, next: &Arc<dyn RpcTransport>) {
        self.provider.install(next.clone());
        for child in &mut self.extended {
            child.install_provider(next);
        }
    }

    /// Tear down subscriptions on the current provider, if it has any.
    pub async fn clear_subscriptions(&self) -> Result<(), ModuleError> {
        clear_live_subscriptions(&self.provider.get()).await
    }

    /// Add methods to this module, or to a child namespace.
    ///
    /// Extending an existing namespace adds to that child. Method
    /// registration replaces an earlier method of the same name.
    pub fn extend(&mut self, extension: ExtensionSpec) -> Result<(), ModuleError> {
        let ExtensionSpec { namespace, methods } = extension;
        let target = match namespace {
            Some(ns) => self.child_for(&ns)?,
            None => self,
        };
        for method in methods {
            tracing::debug!(
                namespace = target.namespace.as_deref().unwrap_or("<root>"),
                method = method.logical_name(),
                call = method.call(),
                "registering method"
            );
            target.register(method);
        }
        Ok(())
    }

    /// Resolve `extension`'s formatter names against this module, then extend.
    pub fn extend_from_config(&mut self, extension: &ExtensionConfig) -> Result<(), ModuleError> {
        let spec = extension.resolve(self.formatters())?;
        self.extend(spec)
    }

    fn register(&mut self, method: MethodDescriptor) {
        let name = method.logical_name().to_string();
        self.methods.register_model(name, method);
    }

    fn child_for(&mut self, namespace: &str) -> Result<&mut RpcModule, ModuleError> {
        if let Some(idx) = self
            .extended
            .iter()
            .position(|child| child.namespace.as_deref() == Some(namespace))
        {
            return Ok(&mut self.extended[idx]);
        }
        if self.has_own_member(namespace) || self.methods.has_model(namespace) {
            return Err(ModuleError::DuplicateMethod(namespace.to_string()));
        }

        tracing::debug!(namespace, "creating namespace");
        let child = RpcModule {
            namespace: Some(namespace.to_string()),
            provider: self.provider.share(),
            methods: self.methods.fork(),
            controller: self.controller.clone(),
            accounts: self.accounts.clone(),
            batch: self.batch.clone(),
            config: self.config.clone(),
            fields: BTreeMap::new(),
            extended: Vec::new(),
        };
        let idx = self.extended.len();
        self.extended.push(child);
        Ok(&mut self.extended[idx])
    }

    /// A new batch bound to the current provider.
    pub fn batch_request(&self) -> Result<Box<dyn BatchHandle>, ModuleError> {
        let package = self
            .batch
            .as_ref()
            .ok_or(ModuleError::MissingDependency("batch package"))?;
        Ok(package.create_batch(self.provider.get()))
    }
}

impl std::fmt::Debug for RpcModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcModule")
            .field("namespace", &self.namespace)
            .field("provider", &self.provider)
            .field("methods", &self.methods.names())
            .field("extended", &self.extended)
            .finish()
    }
}

/// Builder for a root [`RpcModule`].
#[derive(Default)]
pub struct RpcModuleBuilder {
    provider: Option<ProviderSpec>,
    registry: Option<Arc<dyn ProviderRegistry>>,
    controller: Option<Arc<dyn MethodController>>,
    accounts: Option<Arc<dyn Accounts>>,
    batch: Option<Arc<dyn BatchPackage>>,
    formatters: Option<Formatters>,
    config: ModuleConfig,
    methods: Vec<MethodDescriptor>,
}

impl RpcModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial provider. Without one, the registry's ambient provider is used.
    pub fn provider(mut self, provider: impl Into<ProviderSpec>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Defaults to [`JsonRpcController`].
    pub fn controller(mut self, controller: Arc<dyn MethodController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn accounts(mut self, accounts: Arc<dyn Accounts>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Enables [`RpcModule::batch_request`].
    pub fn batch(mut self, batch: Arc<dyn BatchPackage>) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Defaults to [`Formatters::standard`].
    pub fn formatters(mut self, formatters: Formatters) -> Self {
        self.formatters = Some(formatters);
        self
    }

    pub fn config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a method on the root module.
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Result<RpcModule, ModuleError> {
        let registry = self
            .registry
            .ok_or(ModuleError::MissingDependency("provider registry"))?;
        let initial = match self.provider {
            Some(spec) => spec,
            None => registry
                .detect_ambient()
                .map(ProviderSpec::Transport)
                .ok_or(ModuleError::MissingDependency("provider"))?,
        };
        let provider = ProviderSlot::new(initial, registry)?;

        let formatters = Arc::new(self.formatters.unwrap_or_else(Formatters::standard));
        let mut module = RpcModule {
            namespace: None,
            provider,
            methods: MethodModelFactory::new(formatters),
            controller: self
                .controller
                .unwrap_or_else(|| Arc::new(JsonRpcController::new())),
            accounts: self.accounts,
            batch: self.batch,
            config: self.config,
            fields: BTreeMap::new(),
            extended: Vec::new(),
        };
        for method in self.methods {
            module.register(method);
        }
        Ok(module)
    }
}
