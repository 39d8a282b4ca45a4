// src/registry.rs

//! Static chain and asset registry.
//!
//! Resolves human aliases ("ethereum", "base", 1, 8453) to canonical CAIP-2
//! chain ids and asset symbols to CAIP-19 asset ids with decimal metadata.
//! Unknown aliases are a validation error, never passed through.

use serde_json::{json, Value};

use crate::proto::protocol::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct ChainInfo {
    /// Canonical CAIP-2 id, `namespace:reference`
    pub id: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// eip155 chain number, where applicable
    pub numeric: Option<u64>,
    pub native_symbol: &'static str,
    pub native_decimals: u8,
    /// Chain name as the aggregator (DeFiLlama) spells it
    pub aggregator_name: &'static str,
}

pub const CHAINS: &[ChainInfo] = &[
    ChainInfo {
        id: "eip155:1",
        name: "ethereum",
        aliases: &["ethereum", "eth", "mainnet", "ethereum-mainnet"],
        numeric: Some(1),
        native_symbol: "ETH",
        native_decimals: 18,
        aggregator_name: "Ethereum",
    },
    ChainInfo {
        id: "eip155:8453",
        name: "base",
        aliases: &["base", "base-mainnet"],
        numeric: Some(8453),
        native_symbol: "ETH",
        native_decimals: 18,
        aggregator_name: "Base",
    },
    ChainInfo {
        id: "eip155:42161",
        name: "arbitrum",
        aliases: &["arbitrum", "arb", "arbitrum-one"],
        numeric: Some(42161),
        native_symbol: "ETH",
        native_decimals: 18,
        aggregator_name: "Arbitrum",
    },
    ChainInfo {
        id: "eip155:10",
        name: "optimism",
        aliases: &["optimism", "op", "op-mainnet"],
        numeric: Some(10),
        native_symbol: "ETH",
        native_decimals: 18,
        aggregator_name: "Optimism",
    },
    ChainInfo {
        id: "eip155:137",
        name: "polygon",
        aliases: &["polygon", "matic", "polygon-pos"],
        numeric: Some(137),
        native_symbol: "POL",
        native_decimals: 18,
        aggregator_name: "Polygon",
    },
    ChainInfo {
        id: "eip155:56",
        name: "bsc",
        aliases: &["bsc", "bnb", "binance", "binance-smart-chain"],
        numeric: Some(56),
        native_symbol: "BNB",
        native_decimals: 18,
        aggregator_name: "BSC",
    },
    ChainInfo {
        id: "eip155:43114",
        name: "avalanche",
        aliases: &["avalanche", "avax", "avalanche-c"],
        numeric: Some(43114),
        native_symbol: "AVAX",
        native_decimals: 18,
        aggregator_name: "Avalanche",
    },
    ChainInfo {
        id: "eip155:143",
        name: "monad",
        aliases: &["monad", "monad-mainnet"],
        numeric: Some(143),
        native_symbol: "MON",
        native_decimals: 18,
        aggregator_name: "Monad",
    },
    ChainInfo {
        id: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
        name: "solana",
        aliases: &["solana", "sol", "solana-mainnet"],
        numeric: None,
        native_symbol: "SOL",
        native_decimals: 9,
        aggregator_name: "Solana",
    },
];

#[derive(Debug, Clone, Copy)]
pub struct AssetInfo {
    pub symbol: &'static str,
    /// CAIP-2 id of the chain the asset lives on
    pub chain: &'static str,
    pub address: &'static str,
    pub decimals: u8,
}

pub const ASSETS: &[AssetInfo] = &[
    // Ethereum mainnet
    AssetInfo { symbol: "USDC", chain: "eip155:1", address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", decimals: 6 },
    AssetInfo { symbol: "USDT", chain: "eip155:1", address: "0xdac17f958d2ee523a2206206994597c13d831ec7", decimals: 6 },
    AssetInfo { symbol: "DAI", chain: "eip155:1", address: "0x6b175474e89094c44da98b954eedeac495271d0f", decimals: 18 },
    AssetInfo { symbol: "WETH", chain: "eip155:1", address: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", decimals: 18 },
    AssetInfo { symbol: "WBTC", chain: "eip155:1", address: "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", decimals: 8 },
    // Base
    AssetInfo { symbol: "USDC", chain: "eip155:8453", address: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", decimals: 6 },
    AssetInfo { symbol: "WETH", chain: "eip155:8453", address: "0x4200000000000000000000000000000000000006", decimals: 18 },
    AssetInfo { symbol: "DAI", chain: "eip155:8453", address: "0x50c5725949a6f0c72e6c4a641f24049a917db0cb", decimals: 18 },
    // Arbitrum One
    AssetInfo { symbol: "USDC", chain: "eip155:42161", address: "0xaf88d065e77c8cc2239327c5edb3a432268e5831", decimals: 6 },
    AssetInfo { symbol: "USDT", chain: "eip155:42161", address: "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9", decimals: 6 },
    AssetInfo { symbol: "WETH", chain: "eip155:42161", address: "0x82af49447d8a07e3bd95bd0d56f35241523fbab1", decimals: 18 },
    // Optimism
    AssetInfo { symbol: "USDC", chain: "eip155:10", address: "0x0b2c639c533813f4aa9d7837caf62653d097ff85", decimals: 6 },
    AssetInfo { symbol: "WETH", chain: "eip155:10", address: "0x4200000000000000000000000000000000000006", decimals: 18 },
];

/// USD-stable symbols considered one family for loose asset matching.
pub const STABLE_FAMILY: &[&str] = &[
    "USDC", "USDC.E", "USDT", "DAI", "USDS", "FRAX", "LUSD", "TUSD", "GUSD",
    "USDP", "PYUSD", "USDE", "SUSD", "USDM",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Family,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Family => "family",
        }
    }
}

/// Exact case-insensitive symbol match, or a USD-stable family match.
pub fn symbol_matches(filter: &str, candidate: &str) -> Option<MatchKind> {
    let filter = filter.trim().to_uppercase();
    let candidate = candidate.trim().to_uppercase();
    if filter == candidate {
        return Some(MatchKind::Exact);
    }
    let in_family = |s: &str| STABLE_FAMILY.iter().any(|f| *f == s);
    if in_family(&filter) && in_family(&candidate) {
        return Some(MatchKind::Family);
    }
    None
}

/// Normalize a chain alias, numeric id, or canonical CAIP-2 id to its
/// registry entry.
pub fn normalize_chain(input: &str) -> Result<&'static ChainInfo, CoreError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(CoreError::usage("Missing or invalid required argument: 'chain'"));
    }
    let lowered = raw.to_lowercase();

    for chain in CHAINS {
        if chain.id.to_lowercase() == lowered {
            return Ok(chain);
        }
        if chain.aliases.iter().any(|a| *a == lowered) {
            return Ok(chain);
        }
        if let Some(n) = chain.numeric {
            if lowered == n.to_string() || lowered == format!("eip155:{}", n) {
                return Ok(chain);
            }
        }
    }

    Err(CoreError::usage(format!("Unknown chain: '{}'", raw)))
}

fn is_hex_address(s: &str) -> bool {
    let body = s.strip_prefix("0x").unwrap_or(s);
    body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    /// Canonical CAIP-19 id
    pub asset_id: String,
    pub symbol: Option<String>,
    pub address: Option<String>,
    pub decimals: Option<u8>,
}

impl ResolvedAsset {
    pub fn to_json(&self, chain: &ChainInfo) -> Value {
        json!({
            "assetId": self.asset_id,
            "chainId": chain.id,
            "symbol": self.symbol,
            "address": self.address,
            "decimals": self.decimals,
        })
    }
}

/// Resolve an asset reference on a chain. Accepts a known symbol
/// (case-insensitive), a raw hex contract address, or a CAIP-19 id
/// verbatim. The chain's native symbol resolves to its slip44 id.
pub fn resolve_asset(chain: &ChainInfo, input: &str) -> Result<ResolvedAsset, CoreError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(CoreError::usage("Missing or invalid required argument: 'asset'"));
    }

    // Already canonical: "chainId/assetNamespace:reference"
    if raw.contains('/') && raw.contains(':') {
        let address = raw
            .rsplit(':')
            .next()
            .filter(|tail| is_hex_address(tail))
            .map(|tail| tail.to_lowercase());
        let decimals = address
            .as_deref()
            .and_then(|addr| ASSETS.iter().find(|a| a.chain == chain.id && a.address == addr))
            .map(|a| a.decimals);
        return Ok(ResolvedAsset {
            asset_id: raw.to_string(),
            symbol: None,
            address,
            decimals,
        });
    }

    if is_hex_address(raw) {
        let addr = format!("0x{}", raw.strip_prefix("0x").unwrap_or(raw).to_lowercase());
        let known = ASSETS
            .iter()
            .find(|a| a.chain == chain.id && a.address == addr);
        return Ok(ResolvedAsset {
            asset_id: format!("{}/erc20:{}", chain.id, addr),
            symbol: known.map(|a| a.symbol.to_string()),
            address: Some(addr),
            decimals: known.map(|a| a.decimals),
        });
    }

    let upper = raw.to_uppercase();
    if upper == chain.native_symbol {
        let slip44 = if chain.id.starts_with("solana:") { 501 } else { 60 };
        return Ok(ResolvedAsset {
            asset_id: format!("{}/slip44:{}", chain.id, slip44),
            symbol: Some(chain.native_symbol.to_string()),
            address: None,
            decimals: Some(chain.native_decimals),
        });
    }

    if let Some(asset) = ASSETS
        .iter()
        .find(|a| a.chain == chain.id && a.symbol.eq_ignore_ascii_case(raw))
    {
        return Ok(ResolvedAsset {
            asset_id: format!("{}/erc20:{}", chain.id, asset.address),
            symbol: Some(asset.symbol.to_string()),
            address: Some(asset.address.to_string()),
            decimals: Some(asset.decimals),
        });
    }

    Err(CoreError::usage(format!(
        "Unknown asset '{}' on chain '{}'",
        raw, chain.id
    )))
}
