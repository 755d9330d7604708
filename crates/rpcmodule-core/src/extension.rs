//! Extension specs: the unit of runtime extension for a module.
//!
//! [`ExtensionSpec`] carries formatter closures directly. [`ExtensionConfig`]
//! is its serde form, naming formatters instead, and is resolved against a
//! module's formatter table before use.

use serde::{Deserialize, Serialize};

use crate::error::ModuleError;
use crate::formatters::Formatters;
use crate::method::MethodDescriptor;

/// Methods to add, optionally under a new namespace.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSpec {
    pub namespace: Option<String>,
    pub methods: Vec<MethodDescriptor>,
}

impl ExtensionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the methods on a child module called `namespace`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }
}

/// A method entry of an [`ExtensionConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodConfig {
    /// Logical name; defaults to `call`.
    #[serde(default)]
    pub name: Option<String>,
    pub call: String,
    #[serde(default)]
    pub params: usize,
    /// Input formatter names by position; `null` skips a position.
    #[serde(default)]
    pub input_formatters: Vec<Option<String>>,
    #[serde(default)]
    pub output_formatter: Option<String>,
}

/// Serde form of an [`ExtensionSpec`].
///
/// ```json
/// {
///   "namespace": "eth",
///   "methods": [
///     { "name": "getBalance", "call": "eth_getBalance", "params": 2,
///       "inputFormatters": ["inputAddress", "inputBlockNumber"],
///       "outputFormatter": "hexToNumberString" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

impl ExtensionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up every named formatter in `formatters`.
    pub fn resolve(&self, formatters: &Formatters) -> Result<ExtensionSpec, ModuleError> {
        let methods = self
            .methods
            .iter()
            .map(|m| {
                let inputs = m
                    .input_formatters
                    .iter()
                    .map(|name| name.as_deref().map(|n| formatters.input(n)).transpose())
                    .collect::<Result<Vec<_>, _>>()?;
                let mut descriptor = MethodDescriptor::new(m.call.clone())
                    .params(m.params)
                    .input_formatters(inputs);
                if let Some(name) = &m.name {
                    descriptor = descriptor.name(name.clone());
                }
                if let Some(output) = &m.output_formatter {
                    descriptor = descriptor.output_formatter(formatters.output(output)?);
                }
                Ok(descriptor)
            })
            .collect::<Result<Vec<_>, ModuleError>>()?;

        Ok(ExtensionSpec {
            namespace: self.namespace.clone(),
            methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BALANCE: &str = r#"{
        "namespace": "eth",
        "methods": [
            { "name": "getBalance", "call": "eth_getBalance", "params": 2,
              "inputFormatters": ["inputAddress", null],
              "outputFormatter": "hexToNumberString" },
            { "call": "eth_chainId" }
        ]
    }"#;

    #[test]
    fn resolves_named_formatters() {
        let cfg = ExtensionConfig::from_json(BALANCE).unwrap();
        let spec = cfg.resolve(&Formatters::standard()).unwrap();
        assert_eq!(spec.namespace.as_deref(), Some("eth"));
        assert_eq!(spec.methods.len(), 2);
        assert_eq!(spec.methods[0].logical_name(), "getBalance");
        assert_eq!(spec.methods[0].param_count(), 2);
        assert_eq!(spec.methods[1].logical_name(), "eth_chainId");
    }

    #[test]
    fn unknown_formatter_fails_resolution() {
        let cfg = ExtensionConfig {
            namespace: None,
            methods: vec![MethodConfig {
                name: None,
                call: "eth_getBalance".into(),
                params: 1,
                input_formatters: vec![Some("inputEnsName".into())],
                output_formatter: None,
            }],
        };
        let err = cfg.resolve(&Formatters::standard()).unwrap_err();
        assert!(matches!(err, ModuleError::UnknownFormatter(n) if n == "inputEnsName"));
    }
}
