//! Built-in `eth` and `net` namespaces.

use rpcmodule_core::{ExtensionSpec, Formatters, MethodDescriptor, ModuleError};

/// The `eth` namespace: common read-only methods with their formatters.
pub fn eth_namespace(f: &Formatters) -> Result<ExtensionSpec, ModuleError> {
    let address = f.input("inputAddress")?;
    let block = f.input("inputBlockNumber")?;
    let number = f.output("hexToNumber")?;
    let big = f.output("hexToNumberString")?;

    Ok(ExtensionSpec::new()
        .namespace("eth")
        .method(
            MethodDescriptor::new("eth_blockNumber")
                .name("getBlockNumber")
                .output_formatter(number.clone()),
        )
        .method(
            MethodDescriptor::new("eth_chainId")
                .name("getChainId")
                .output_formatter(number.clone()),
        )
        .method(
            MethodDescriptor::new("eth_gasPrice")
                .name("getGasPrice")
                .output_formatter(big.clone()),
        )
        .method(
            MethodDescriptor::new("eth_getBalance")
                .name("getBalance")
                .params(2)
                .input_formatters(vec![Some(address.clone()), Some(block.clone())])
                .output_formatter(big),
        )
        .method(
            MethodDescriptor::new("eth_getTransactionCount")
                .name("getTransactionCount")
                .params(2)
                .input_formatters(vec![Some(f.input("inputDefaultAccount")?), Some(block.clone())])
                .output_formatter(number),
        )
        .method(
            MethodDescriptor::new("eth_getCode")
                .name("getCode")
                .params(2)
                .input_formatters(vec![Some(address), Some(block.clone())]),
        )
        .method(
            MethodDescriptor::new("eth_getBlockByNumber")
                .name("getBlock")
                .params(2)
                .input_formatters(vec![Some(block), None]),
        )
        .method(
            MethodDescriptor::new("eth_getTransactionReceipt")
                .name("getTransactionReceipt")
                .params(1),
        ))
}

/// The `net` namespace.
pub fn net_namespace(f: &Formatters) -> Result<ExtensionSpec, ModuleError> {
    Ok(ExtensionSpec::new()
        .namespace("net")
        .method(MethodDescriptor::new("net_version").name("getId"))
        .method(
            MethodDescriptor::new("net_peerCount")
                .name("getPeerCount")
                .output_formatter(f.output("hexToNumber")?),
        )
        .method(MethodDescriptor::new("net_listening").name("isListening")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_namespace_resolves_standard_formatters() {
        let spec = eth_namespace(&Formatters::standard()).unwrap();
        assert_eq!(spec.namespace.as_deref(), Some("eth"));
        let balance = spec
            .methods
            .iter()
            .find(|m| m.logical_name() == "getBalance")
            .unwrap();
        assert_eq!(balance.call(), "eth_getBalance");
        assert_eq!(balance.param_count(), 2);
    }

    #[test]
    fn missing_formatter_is_reported() {
        let err = net_namespace(&Formatters::new()).unwrap_err();
        assert!(matches!(err, ModuleError::UnknownFormatter(n) if n == "hexToNumber"));
    }
}
