//! Per-module defaults, exposed as plain members of the module.

use serde::{Deserialize, Serialize};

/// Module defaults. Keys serialise in camelCase and double as the module's
/// plain member names (`defaultBlock`, `defaultAccount`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Sender used when a call omits one.
    #[serde(default)]
    pub default_account: Option<String>,
    /// Block used when a call omits one: a tag or a hex number.
    #[serde(default = "default_block")]
    pub default_block: String,
    #[serde(default)]
    pub default_gas_price: Option<String>,
    #[serde(default)]
    pub default_gas: Option<u64>,
    /// Blocks to wait for a transaction before giving up.
    #[serde(default = "default_block_timeout")]
    pub transaction_block_timeout: u64,
    #[serde(default = "default_confirmation_blocks")]
    pub transaction_confirmation_blocks: u64,
    /// Seconds to poll for a receipt over non-subscribing transports.
    #[serde(default = "default_polling_timeout")]
    pub transaction_polling_timeout: u64,
}

fn default_block() -> String {
    "latest".into()
}

fn default_block_timeout() -> u64 {
    50
}

fn default_confirmation_blocks() -> u64 {
    24
}

fn default_polling_timeout() -> u64 {
    750
}

impl ModuleConfig {
    /// Member names contributed by the configuration.
    pub const KEYS: &'static [&'static str] = &[
        "defaultAccount",
        "defaultBlock",
        "defaultGasPrice",
        "defaultGas",
        "transactionBlockTimeout",
        "transactionConfirmationBlocks",
        "transactionPollingTimeout",
    ];
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            default_account: None,
            default_block: default_block(),
            default_gas_price: None,
            default_gas: None,
            transaction_block_timeout: default_block_timeout(),
            transaction_confirmation_blocks: default_confirmation_blocks(),
            transaction_polling_timeout: default_polling_timeout(),
        }
    }
}
