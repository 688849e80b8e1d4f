//! Static chain descriptors.
//!
//! A [`Chain`] is immutable reference data: it is cloned freely and never owned
//! by a wallet or the manager. A handful of well-known chains are built in;
//! anything else is produced by [`define_chain`] with the default RPC template.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::network::{resolve_template, DEFAULT_RPC_URL_TEMPLATE};
use crate::shared::hex::quantity;
use crate::shared::ChainId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockExplorer {
    pub name: String,
    pub url: String,
}

/// An EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: ChainId,
    pub name: Option<String>,
    /// RPC endpoint. May point at the hosted RPC, in which case the client id
    /// is appended when resolved (see `Client::rpc_url`).
    pub rpc: String,
    pub native_currency: NativeCurrency,
    #[serde(default)]
    pub block_explorers: Vec<BlockExplorer>,
    #[serde(default)]
    pub testnet: bool,
}

/// Build a chain from its id alone, using the hosted RPC template.
pub fn define_chain(id: ChainId) -> Chain {
    Chain {
        id,
        name: None,
        rpc: resolve_template(DEFAULT_RPC_URL_TEMPLATE, id),
        native_currency: NativeCurrency::default(),
        block_explorers: Vec::new(),
        testnet: false,
    }
}

impl Chain {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_rpc(mut self, rpc: &str) -> Self {
        self.rpc = rpc.to_string();
        self
    }

    pub fn with_native_currency(mut self, name: &str, symbol: &str, decimals: u8) -> Self {
        self.native_currency = NativeCurrency {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        };
        self
    }

    pub fn with_explorer(mut self, name: &str, url: &str) -> Self {
        self.block_explorers.push(BlockExplorer {
            name: name.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn testnet(mut self) -> Self {
        self.testnet = true;
        self
    }

    /// Display name, falling back to the CAIP-2 id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| crate::shared::caip2(self.id))
    }

    /// `0x`-prefixed chain id as wallets expect it.
    pub fn hex_id(&self) -> String {
        quantity(self.id as u128)
    }

    /// Payload for `wallet_addEthereumChain`.
    pub fn to_add_chain_params(&self) -> serde_json::Value {
        let explorers: Vec<&str> = self
            .block_explorers
            .iter()
            .map(|e| e.url.as_str())
            .collect();
        let explorer_urls = if explorers.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::json!(explorers)
        };
        serde_json::json!({
            "chainId": self.hex_id(),
            "chainName": self.display_name(),
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": [self.rpc],
            "blockExplorerUrls": explorer_urls,
        })
    }
}

// ─── Built-in chains ─────────────────────────────────────────────────────────

pub fn ethereum() -> Chain {
    define_chain(1)
        .with_name("Ethereum")
        .with_explorer("Etherscan", "https://etherscan.io")
}

pub fn sepolia() -> Chain {
    define_chain(11_155_111)
        .with_name("Sepolia")
        .with_native_currency("Sepolia Ether", "ETH", 18)
        .with_explorer("Etherscan", "https://sepolia.etherscan.io")
        .testnet()
}

pub fn base() -> Chain {
    define_chain(8453)
        .with_name("Base")
        .with_explorer("Basescan", "https://basescan.org")
}

pub fn base_sepolia() -> Chain {
    define_chain(84_532)
        .with_name("Base Sepolia")
        .with_native_currency("Sepolia Ether", "ETH", 18)
        .with_explorer("Basescan", "https://sepolia.basescan.org")
        .testnet()
}

pub fn polygon() -> Chain {
    define_chain(137)
        .with_name("Polygon")
        .with_native_currency("POL", "POL", 18)
        .with_explorer("PolygonScan", "https://polygonscan.com")
}

pub fn arbitrum() -> Chain {
    define_chain(42_161)
        .with_name("Arbitrum One")
        .with_explorer("Arbiscan", "https://arbiscan.io")
}

pub fn optimism() -> Chain {
    define_chain(10)
        .with_name("OP Mainnet")
        .with_explorer("Optimism Explorer", "https://optimistic.etherscan.io")
}

lazy_static! {
    static ref KNOWN_CHAINS: HashMap<ChainId, Chain> = {
        [
            ethereum(),
            sepolia(),
            base(),
            base_sepolia(),
            polygon(),
            arbitrum(),
            optimism(),
        ]
        .into_iter()
        .map(|c| (c.id, c))
        .collect()
    };
}

/// Look up a built-in chain, or define a bare one for unknown ids.
pub fn get_chain_by_id(id: ChainId) -> Chain {
    KNOWN_CHAINS
        .get(&id)
        .cloned()
        .unwrap_or_else(|| define_chain(id))
}
