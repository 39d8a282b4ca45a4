// src/markets/registry.rs

//! Bundled registry of known markets: the engine's final fallback when live
//! data cannot be obtained (or was never requested). Rates are indicative
//! snapshots, not live values.

#[derive(Debug, Clone, Copy)]
pub struct StaticMarket {
    pub market: &'static str,
    pub provider: &'static str,
    /// Canonical chain name from the chain registry
    pub chain: &'static str,
    pub symbol: &'static str,
    pub apy: f64,
    pub apy_base: f64,
    pub apy_reward: f64,
    pub apy_borrow: Option<f64>,
    pub tvl_usd: f64,
}

pub const STATIC_MARKETS: &[StaticMarket] = &[
    StaticMarket {
        market: "aave-v3:ethereum:USDC",
        provider: "aave-v3",
        chain: "ethereum",
        symbol: "USDC",
        apy: 4.1,
        apy_base: 4.1,
        apy_reward: 0.0,
        apy_borrow: Some(5.6),
        tvl_usd: 480_000_000.0,
    },
    StaticMarket {
        market: "aave-v3:ethereum:USDT",
        provider: "aave-v3",
        chain: "ethereum",
        symbol: "USDT",
        apy: 3.8,
        apy_base: 3.8,
        apy_reward: 0.0,
        apy_borrow: Some(5.2),
        tvl_usd: 320_000_000.0,
    },
    StaticMarket {
        market: "aave-v3:ethereum:WETH",
        provider: "aave-v3",
        chain: "ethereum",
        symbol: "WETH",
        apy: 1.9,
        apy_base: 1.9,
        apy_reward: 0.0,
        apy_borrow: Some(2.6),
        tvl_usd: 1_100_000_000.0,
    },
    StaticMarket {
        market: "compound-v3:ethereum:USDC",
        provider: "compound-v3",
        chain: "ethereum",
        symbol: "USDC",
        apy: 3.6,
        apy_base: 3.2,
        apy_reward: 0.4,
        apy_borrow: Some(4.9),
        tvl_usd: 410_000_000.0,
    },
    StaticMarket {
        market: "morpho-blue:ethereum:USDC",
        provider: "morpho-blue",
        chain: "ethereum",
        symbol: "USDC",
        apy: 4.7,
        apy_base: 4.7,
        apy_reward: 0.0,
        apy_borrow: Some(6.1),
        tvl_usd: 260_000_000.0,
    },
    StaticMarket {
        market: "morpho-blue:ethereum:DAI",
        provider: "morpho-blue",
        chain: "ethereum",
        symbol: "DAI",
        apy: 4.3,
        apy_base: 4.3,
        apy_reward: 0.0,
        apy_borrow: Some(5.5),
        tvl_usd: 90_000_000.0,
    },
    StaticMarket {
        market: "aave-v3:base:USDC",
        provider: "aave-v3",
        chain: "base",
        symbol: "USDC",
        apy: 4.5,
        apy_base: 4.5,
        apy_reward: 0.0,
        apy_borrow: Some(6.0),
        tvl_usd: 150_000_000.0,
    },
    StaticMarket {
        market: "compound-v3:base:USDC",
        provider: "compound-v3",
        chain: "base",
        symbol: "USDC",
        apy: 4.0,
        apy_base: 3.4,
        apy_reward: 0.6,
        apy_borrow: Some(5.3),
        tvl_usd: 120_000_000.0,
    },
    StaticMarket {
        market: "aave-v3:arbitrum:USDC",
        provider: "aave-v3",
        chain: "arbitrum",
        symbol: "USDC",
        apy: 3.9,
        apy_base: 3.9,
        apy_reward: 0.0,
        apy_borrow: Some(5.4),
        tvl_usd: 180_000_000.0,
    },
    StaticMarket {
        market: "aave-v3:optimism:USDC",
        provider: "aave-v3",
        chain: "optimism",
        symbol: "USDC",
        apy: 3.5,
        apy_base: 3.5,
        apy_reward: 0.0,
        apy_borrow: Some(4.8),
        tvl_usd: 60_000_000.0,
    },
    StaticMarket {
        market: "curvance:monad:USDC",
        provider: "curvance",
        chain: "monad",
        symbol: "USDC",
        apy: 6.8,
        apy_base: 5.1,
        apy_reward: 1.7,
        apy_borrow: Some(8.4),
        tvl_usd: 35_000_000.0,
    },
    StaticMarket {
        market: "curvance:monad:WMON",
        provider: "curvance",
        chain: "monad",
        symbol: "WMON",
        apy: 3.2,
        apy_base: 2.1,
        apy_reward: 1.1,
        apy_borrow: Some(4.4),
        tvl_usd: 22_000_000.0,
    },
    StaticMarket {
        market: "morpho-blue:monad:USDC",
        provider: "morpho-blue",
        chain: "monad",
        symbol: "USDC",
        apy: 5.9,
        apy_base: 5.9,
        apy_reward: 0.0,
        apy_borrow: Some(7.2),
        tvl_usd: 18_000_000.0,
    },
];
