//! Input/output formatters shared by every method model of a module tree.
//!
//! Input formatters run on individual call arguments before a request is
//! built and may read module state (default block, default account). Output
//! formatters run on the decoded result; sequences are mapped element-wise
//! by the method model, so an output formatter only ever sees one element.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ModuleError;
use crate::module::RpcModule;

/// Formats one positional argument.
pub type InputFormatter =
    Arc<dyn Fn(Value, &RpcModule) -> Result<Value, ModuleError> + Send + Sync>;

/// Formats one result value.
pub type OutputFormatter = Arc<dyn Fn(Value) -> Result<Value, ModuleError> + Send + Sync>;

const BLOCK_TAGS: &[&str] = &["latest", "earliest", "pending", "safe", "finalized"];

/// Named formatter tables.
#[derive(Clone, Default)]
pub struct Formatters {
    inputs: HashMap<String, InputFormatter>,
    outputs: HashMap<String, OutputFormatter>,
}

impl Formatters {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in formatters.
    pub fn standard() -> Self {
        let mut f = Self::new();
        f.register_output("hexToNumber", Arc::new(hex_to_number));
        f.register_output("hexToNumberString", Arc::new(hex_to_number_string));
        f.register_output("toLowerCase", Arc::new(to_lower_case));
        f.register_input("numberToHex", Arc::new(|v, _| number_to_hex(v)));
        f.register_input("inputBlockNumber", Arc::new(input_block_number));
        f.register_input("inputAddress", Arc::new(|v, _| input_address(v)));
        f.register_input("inputDefaultAccount", Arc::new(input_default_account));
        f
    }

    pub fn register_input(&mut self, name: impl Into<String>, formatter: InputFormatter) {
        self.inputs.insert(name.into(), formatter);
    }

    pub fn register_output(&mut self, name: impl Into<String>, formatter: OutputFormatter) {
        self.outputs.insert(name.into(), formatter);
    }

    /// Look up an input formatter by name.
    pub fn input(&self, name: &str) -> Result<InputFormatter, ModuleError> {
        self.inputs
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownFormatter(name.to_string()))
    }

    /// Look up an output formatter by name.
    pub fn output(&self, name: &str) -> Result<OutputFormatter, ModuleError> {
        self.outputs
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownFormatter(name.to_string()))
    }
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut inputs: Vec<_> = self.inputs.keys().collect();
        let mut outputs: Vec<_> = self.outputs.keys().collect();
        inputs.sort();
        outputs.sort();
        f.debug_struct("Formatters")
            .field("inputs", &inputs)
            .field("outputs", &outputs)
            .finish()
    }
}

fn parse_hex_u128(s: &str) -> Result<u128, ModuleError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| ModuleError::formatting(format!("'{s}' is not a 0x-prefixed hex string")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ModuleError::formatting(format!("invalid hex quantity '{s}': {e}")))
}

/// `"0x1a"` → `26`. `null` and plain numbers pass through.
pub fn hex_to_number(value: Value) -> Result<Value, ModuleError> {
    match value {
        Value::String(s) => {
            let n = parse_hex_u128(&s)?;
            let n = u64::try_from(n).map_err(|_| {
                ModuleError::formatting(format!("'{s}' does not fit in u64, use hexToNumberString"))
            })?;
            Ok(Value::from(n))
        }
        Value::Null | Value::Number(_) => Ok(value),
        other => Err(ModuleError::formatting(format!("cannot convert {other} to a number"))),
    }
}

/// `"0xde0b6b3a7640000"` → `"1000000000000000000"`.
pub fn hex_to_number_string(value: Value) -> Result<Value, ModuleError> {
    match value {
        Value::String(s) => Ok(Value::String(parse_hex_u128(&s)?.to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Null => Ok(Value::Null),
        other => Err(ModuleError::formatting(format!("cannot convert {other} to a number string"))),
    }
}

pub fn to_lower_case(value: Value) -> Result<Value, ModuleError> {
    match value {
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        other => Ok(other),
    }
}

/// `26` or `"26"` → `"0x1a"`. Hex strings are normalised to lower case.
pub fn number_to_hex(value: Value) -> Result<Value, ModuleError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| Value::String(format!("{n:#x}")))
            .ok_or_else(|| ModuleError::formatting(format!("{n} is not a non-negative integer"))),
        Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => {
            parse_hex_u128(&s)?;
            Ok(Value::String(s.to_lowercase()))
        }
        Value::String(s) => s
            .parse::<u128>()
            .map(|n| Value::String(format!("{n:#x}")))
            .map_err(|e| ModuleError::formatting(format!("invalid number '{s}': {e}"))),
        Value::Null => Ok(Value::Null),
        other => Err(ModuleError::formatting(format!("cannot convert {other} to hex"))),
    }
}

/// Block number or tag. `null` becomes the module's default block.
pub fn input_block_number(value: Value, module: &RpcModule) -> Result<Value, ModuleError> {
    match value {
        Value::Null => number_to_hex_or_tag(Value::String(module.config().default_block.clone())),
        other => number_to_hex_or_tag(other),
    }
}

fn number_to_hex_or_tag(value: Value) -> Result<Value, ModuleError> {
    match &value {
        Value::String(s) if BLOCK_TAGS.contains(&s.as_str()) => Ok(value),
        _ => number_to_hex(value),
    }
}

/// A 20-byte hex address, lower-cased.
pub fn input_address(value: Value) -> Result<Value, ModuleError> {
    let Value::String(s) = &value else {
        return Err(ModuleError::formatting(format!("address must be a string, got {value}")));
    };
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ModuleError::formatting(format!("'{s}' is not a valid address")));
    }
    Ok(Value::String(format!("0x{}", hex.to_lowercase())))
}

/// An address; `null` becomes the module's default account.
pub fn input_default_account(value: Value, module: &RpcModule) -> Result<Value, ModuleError> {
    if !value.is_null() {
        return input_address(value);
    }
    let fallback = module
        .config()
        .default_account
        .clone()
        .or_else(|| module.accounts().and_then(|a| a.default_account()))
        .ok_or_else(|| ModuleError::formatting("no address given and no default account set"))?;
    input_address(Value::String(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_to_number_scalars() {
        assert_eq!(hex_to_number(json!("0x5")).unwrap(), json!(5));
        assert_eq!(hex_to_number(json!("0x")).unwrap(), json!(0));
        assert_eq!(hex_to_number(Value::Null).unwrap(), Value::Null);
        assert!(hex_to_number(json!("5")).is_err());
        assert!(hex_to_number(json!("0xffffffffffffffffff")).is_err());
    }

    #[test]
    fn hex_to_number_string_handles_wei() {
        assert_eq!(
            hex_to_number_string(json!("0xde0b6b3a7640000")).unwrap(),
            json!("1000000000000000000")
        );
    }

    #[test]
    fn number_to_hex_variants() {
        assert_eq!(number_to_hex(json!(26)).unwrap(), json!("0x1a"));
        assert_eq!(number_to_hex(json!("26")).unwrap(), json!("0x1a"));
        assert_eq!(number_to_hex(json!("0xAB")).unwrap(), json!("0xab"));
        assert!(number_to_hex(json!(-1)).is_err());
        assert!(number_to_hex(json!("0xzz")).is_err());
    }

    #[test]
    fn address_validation() {
        let addr = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
        assert_eq!(
            input_address(json!(addr)).unwrap(),
            json!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
        );
        assert!(input_address(json!("0x1234")).is_err());
        assert!(input_address(json!(12)).is_err());
    }

    #[test]
    fn unknown_names_are_reported() {
        let f = Formatters::standard();
        assert!(f.output("hexToNumber").is_ok());
        assert!(f.input("inputBlockNumber").is_ok());
        assert!(matches!(f.output("toWei"), Err(ModuleError::UnknownFormatter(n)) if n == "toWei"));
    }
}
