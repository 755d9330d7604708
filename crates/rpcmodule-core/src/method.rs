//! Method descriptors and the per-call method model built from them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ModuleError;
use crate::formatters::{Formatters, InputFormatter, OutputFormatter};
use crate::module::RpcModule;
use crate::request::JsonRpcRequest;

/// Static description of one RPC method.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rpcmodule_core::formatters::hex_to_number;
/// use rpcmodule_core::MethodDescriptor;
///
/// let block_number = MethodDescriptor::new("eth_blockNumber")
///     .name("getBlockNumber")
///     .output_formatter(Arc::new(hex_to_number));
/// assert_eq!(block_number.call(), "eth_blockNumber");
/// ```
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    call: String,
    params: usize,
    input_formatters: Vec<Option<InputFormatter>>,
    output_formatter: Option<OutputFormatter>,
}

impl MethodDescriptor {
    /// A method with no parameters and no formatting, exposed under its wire name.
    pub fn new(call: impl Into<String>) -> Self {
        let call = call.into();
        Self {
            name: call.clone(),
            call,
            params: 0,
            input_formatters: Vec::new(),
            output_formatter: None,
        }
    }

    /// Expose the method under a logical name different from the wire name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of positional arguments the method takes.
    pub fn params(mut self, params: usize) -> Self {
        self.params = params;
        self
    }

    /// Formatters by argument position; `None` leaves that argument untouched.
    pub fn input_formatters(mut self, formatters: Vec<Option<InputFormatter>>) -> Self {
        self.input_formatters = formatters;
        self
    }

    pub fn output_formatter(mut self, formatter: OutputFormatter) -> Self {
        self.output_formatter = Some(formatter);
        self
    }

    /// The logical name the method is registered under.
    pub fn logical_name(&self) -> &str {
        &self.name
    }

    /// The wire method string.
    pub fn call(&self) -> &str {
        &self.call
    }

    pub fn param_count(&self) -> usize {
        self.params
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("call", &self.call)
            .field("params", &self.params)
            .field(
                "input_formatters",
                &self.input_formatters.iter().map(Option::is_some).collect::<Vec<_>>(),
            )
            .field("output_formatter", &self.output_formatter.is_some())
            .finish()
    }
}

/// One invocation of a method: its descriptor plus the call arguments.
#[derive(Clone)]
pub struct MethodModel {
    descriptor: Arc<MethodDescriptor>,
    formatters: Arc<Formatters>,
    arguments: Vec<Value>,
}

impl MethodModel {
    pub(crate) fn new(descriptor: Arc<MethodDescriptor>, formatters: Arc<Formatters>) -> Self {
        Self {
            descriptor,
            formatters,
            arguments: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.logical_name()
    }

    pub fn call(&self) -> &str {
        self.descriptor.call()
    }

    pub fn param_count(&self) -> usize {
        self.descriptor.param_count()
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn set_arguments(&mut self, arguments: Vec<Value>) {
        self.arguments = arguments;
    }

    /// The formatter table shared across the module tree.
    pub fn formatters(&self) -> &Formatters {
        &self.formatters
    }

    /// Validate the argument count and run the input formatters in place.
    pub fn before_execution(&mut self, module: &RpcModule) -> Result<(), ModuleError> {
        let expected = self.descriptor.param_count();
        if self.arguments.len() != expected {
            return Err(ModuleError::InvalidArgumentCount {
                method: self.descriptor.logical_name().to_string(),
                expected,
                got: self.arguments.len(),
            });
        }

        for (index, formatter) in self.descriptor.input_formatters.iter().enumerate() {
            let (Some(formatter), Some(arg)) = (formatter, self.arguments.get_mut(index)) else {
                continue;
            };
            *arg = formatter(std::mem::take(arg), module)?;
        }
        Ok(())
    }

    /// Format the raw result. Arrays are formatted element by element.
    pub fn after_execution(&self, response: Value) -> Result<Value, ModuleError> {
        let Some(formatter) = &self.descriptor.output_formatter else {
            return Ok(response);
        };
        match response {
            Value::Array(items) => items
                .into_iter()
                .map(|item| formatter(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => formatter(other),
        }
    }

    /// Build the wire request from the (already formatted) arguments.
    pub fn to_request(&self, id: u64) -> JsonRpcRequest {
        JsonRpcRequest::new(id, self.call(), self.arguments.clone())
    }
}

impl fmt::Debug for MethodModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodModel")
            .field("name", &self.name())
            .field("call", &self.call())
            .field("arguments", &self.arguments)
            .finish()
    }
}
