//! rpcmodule CLI — call JSON-RPC methods through the module façade.
//!
//! Usage:
//! ```bash
//! # Call a built-in namespaced method (formatters applied)
//! rpcmodule call --url https://cloudflare-eth.com --method eth.getBlockNumber
//!
//! # Send any raw JSON-RPC method with positional params
//! rpcmodule call --url https://cloudflare-eth.com --method eth_getBalance \
//!     --params '["0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", "latest"]'
//!
//! # Several calls in one JSON-RPC batch
//! rpcmodule batch --url https://cloudflare-eth.com --method eth.getChainId --method eth.getGasPrice
//!
//! # Load extra methods from a JSON extension file
//! rpcmodule methods --extension erc20.json
//! ```

mod eth;
mod logging;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use rpcmodule_core::{
    BoundMethod, ExtensionConfig, ExtensionSpec, JsonRpcBatchPackage, MethodDescriptor, RpcModule,
};
use rpcmodule_providers::{DefaultProviderRegistry, AMBIENT_PROVIDER_VAR};

/// Endpoint used by commands that never send a request.
const OFFLINE_URL: &str = "http://localhost:8545";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    logging::init_tracing(&logging::LogConfig {
        level: parse_flag(&args, "--log-level").unwrap_or_else(|| "warn".into()),
        json: has_flag(&args, "--json-logs"),
    });

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "batch" => cmd_batch(&args[2..]).await,
        "methods" => cmd_methods(&args[2..]),
        "providers" => {
            cmd_providers();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("rpcmodule {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("rpcmodule {}", env!("CARGO_PKG_VERSION"));
    println!("Call JSON-RPC methods through an extensible module\n");
    println!("USAGE:");
    println!("    rpcmodule <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    call       Call one method");
    println!("    batch      Call several methods in one JSON-RPC batch");
    println!("    methods    List registered methods per namespace");
    println!("    providers  List supported provider kinds");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>              http(s):// or ws(s):// endpoint  [default: ${AMBIENT_PROVIDER_VAR}]");
    println!("    --method <NAME>          `ns.method`, a root method, or any raw RPC method (repeatable for batch)");
    println!("    --params <JSON>          JSON array of positional params");
    println!("    --extension <FILE>       JSON extension file (repeatable)");
    println!("    --default-block <BLOCK>  Block used when a block param is null  [default: latest]");
    println!("    --log-level <LEVEL>      Log level when RUST_LOG is unset  [default: warn]");
    println!("    --json-logs              Emit JSON logs on stderr");
}

async fn cmd_call(args: &[String]) -> Result<()> {
    let method = parse_flag(args, "--method").context("--method is required")?;
    let params = parse_params(args)?;

    let mut module = build_module(args, None)?;
    let (ns, name) = ensure_method(&mut module, &method, params.len())?;

    let result = lookup(&module, ns.as_deref(), &name)?.call(params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_batch(args: &[String]) -> Result<()> {
    let methods = parse_flags(args, "--method");
    if methods.is_empty() {
        bail!("at least one --method is required");
    }

    let mut module = build_module(args, None)?;
    let mut targets = Vec::with_capacity(methods.len());
    for method in &methods {
        targets.push(ensure_method(&mut module, method, 0)?);
    }

    let mut batch = module.batch_request()?;
    for (ns, name) in &targets {
        batch.add(lookup(&module, ns.as_deref(), name)?.request(vec![])?);
    }

    for (method, result) in methods.iter().zip(batch.execute().await?) {
        match result {
            Ok(value) => println!("{method}: {value}"),
            Err(e) => println!("{method}: error: {e}"),
        }
    }
    Ok(())
}

fn cmd_methods(args: &[String]) -> Result<()> {
    let module = build_module(args, Some(OFFLINE_URL))?;
    print_methods(&module, "");
    Ok(())
}

fn print_methods(module: &RpcModule, prefix: &str) {
    for name in module.method_names() {
        println!("{prefix}{name}");
    }
    for child in module.extensions() {
        if let Some(ns) = child.namespace_name() {
            print_methods(child, &format!("{prefix}{ns}."));
        }
    }
}

fn cmd_providers() {
    use rpcmodule_core::ProviderRegistry;

    let registry = DefaultProviderRegistry::default();
    println!("Supported provider kinds:\n");
    for kind in registry.known_kinds() {
        println!("  {kind}");
    }
    println!();
    match registry.detect_ambient() {
        Some(t) => println!("Ambient provider (${AMBIENT_PROVIDER_VAR}): {}", t.url()),
        None => println!("No ambient provider (${AMBIENT_PROVIDER_VAR} unset)"),
    }
}

/// Build the module with the built-in namespaces and any extension files.
fn build_module(args: &[String], fallback_url: Option<&str>) -> Result<RpcModule> {
    let mut builder = RpcModule::builder()
        .registry(Arc::new(DefaultProviderRegistry::default()))
        .batch(Arc::new(JsonRpcBatchPackage));
    if let Some(url) = parse_flag(args, "--url").or_else(|| {
        fallback_url
            .filter(|_| env::var(AMBIENT_PROVIDER_VAR).is_err())
            .map(str::to_string)
    }) {
        builder = builder.provider(url);
    }

    let mut module = builder
        .build()
        .with_context(|| format!("pass --url or set ${AMBIENT_PROVIDER_VAR}"))?;
    if let Some(block) = parse_flag(args, "--default-block") {
        module.config_mut().default_block = block;
    }

    let eth = eth::eth_namespace(module.formatters())?;
    let net = eth::net_namespace(module.formatters())?;
    module.extend(eth)?;
    module.extend(net)?;

    for path in parse_flags(args, "--extension") {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading extension file {path}"))?;
        let config = ExtensionConfig::from_json(&json)
            .with_context(|| format!("parsing extension file {path}"))?;
        module.extend_from_config(&config)?;
        tracing::info!(path = %path, namespace = ?config.namespace, "loaded extension");
    }
    Ok(module)
}

/// Split `ns.method` and make sure the method exists. An unknown root name
/// is registered as a raw RPC method taking `params` arguments.
fn ensure_method(
    module: &mut RpcModule,
    method: &str,
    params: usize,
) -> Result<(Option<String>, String)> {
    if let Some((ns, name)) = method.split_once('.') {
        let child = module
            .namespace(ns)
            .ok_or_else(|| anyhow!("unknown namespace '{ns}'"))?;
        if !child.has_method(name) {
            bail!("namespace '{ns}' has no method '{name}'");
        }
        return Ok((Some(ns.to_string()), name.to_string()));
    }

    if !module.has_method(method) {
        tracing::debug!(method, params, "registering raw method");
        module.extend(ExtensionSpec::new().method(MethodDescriptor::new(method).params(params)))?;
    }
    Ok((None, method.to_string()))
}

fn lookup<'a>(module: &'a RpcModule, ns: Option<&str>, name: &str) -> Result<BoundMethod<'a>> {
    let target = match ns {
        Some(ns) => module
            .namespace(ns)
            .ok_or_else(|| anyhow!("unknown namespace '{ns}'"))?,
        None => module,
    };
    Ok(target.method(name)?)
}

fn parse_params(args: &[String]) -> Result<Vec<Value>> {
    let Some(raw) = parse_flag(args, "--params") else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(&raw).context("--params must be JSON")? {
        Value::Array(items) => Ok(items),
        other => bail!("--params must be a JSON array, got {other}"),
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_flags(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|pair| pair[0] == flag)
        .map(|pair| pair[1].clone())
        .collect()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_repeated_flags() {
        let a = args(&["--method", "eth.getChainId", "--url", "x", "--method", "net.getId"]);
        assert_eq!(parse_flag(&a, "--url").as_deref(), Some("x"));
        assert_eq!(parse_flags(&a, "--method"), vec!["eth.getChainId", "net.getId"]);
        assert!(!has_flag(&a, "--json-logs"));
    }

    #[test]
    fn params_must_be_an_array() {
        assert!(parse_params(&args(&["--params", "{}"])).is_err());
        assert_eq!(
            parse_params(&args(&["--params", r#"["0x1", true]"#])).unwrap(),
            vec![Value::from("0x1"), Value::from(true)]
        );
        assert!(parse_params(&[]).unwrap().is_empty());
    }

    #[test]
    fn builds_module_with_builtin_namespaces() {
        let mut module = build_module(&args(&["--url", OFFLINE_URL]), None).unwrap();
        assert!(module.namespace("eth").unwrap().has_method("getBalance"));
        assert!(module.namespace("net").unwrap().has_method("getPeerCount"));

        let (ns, name) = ensure_method(&mut module, "eth.getBlockNumber", 0).unwrap();
        assert_eq!((ns.as_deref(), name.as_str()), (Some("eth"), "getBlockNumber"));

        let (ns, _) = ensure_method(&mut module, "web3_clientVersion", 0).unwrap();
        assert!(ns.is_none());
        assert!(module.has_method("web3_clientVersion"));

        assert!(ensure_method(&mut module, "eth.nope", 0).is_err());
        assert!(ensure_method(&mut module, "debug.traceCall", 0).is_err());
    }
}
