//! Method model factory: the name → descriptor table of one module.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ModuleError;
use crate::formatters::Formatters;
use crate::method::{MethodDescriptor, MethodModel};

/// Name → descriptor table of one module, sharing a formatter set with the
/// rest of the module tree.
#[derive(Clone, Debug)]
pub struct MethodModelFactory {
    models: HashMap<String, Arc<MethodDescriptor>>,
    formatters: Arc<Formatters>,
}

impl MethodModelFactory {
    pub fn new(formatters: Arc<Formatters>) -> Self {
        Self {
            models: HashMap::new(),
            formatters,
        }
    }

    /// A factory with the same formatters and no registered models.
    pub fn fork(&self) -> Self {
        Self::new(self.formatters.clone())
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Build a fresh model for `name`.
    pub fn create_model(&self, name: &str) -> Result<MethodModel, ModuleError> {
        let descriptor = self
            .models
            .get(name)
            .ok_or_else(|| ModuleError::UnknownMethod(name.to_string()))?;
        Ok(MethodModel::new(descriptor.clone(), self.formatters.clone()))
    }

    /// Register `descriptor` under `name`, replacing any earlier entry.
    pub fn register_model(&mut self, name: impl Into<String>, descriptor: MethodDescriptor) {
        let name = name.into();
        if self.models.insert(name.clone(), Arc::new(descriptor)).is_some() {
            tracing::debug!(method = %name, "replaced method model");
        }
    }

    pub fn formatters(&self) -> &Arc<Formatters> {
        &self.formatters
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
