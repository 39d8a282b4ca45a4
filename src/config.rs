// src/config.rs

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default aggregator endpoint (DeFiLlama yields API).
pub const DEFAULT_DEFILLAMA_URL: &str = "https://yields.llama.fi/pools";

// A struct to hold all configuration, loaded once at startup from the environment.
// No other module reads environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    // Policy settings
    /// Optional comma-separated allowlist of cataloged actions. `None` means
    /// every cataloged action is permitted.
    pub allowed_actions: Option<Vec<String>>,
    /// Strict mode disables the fresh-cache short-circuit on RPC reads and
    /// forces broadcast off unless ALLOW_BROADCAST is set explicitly.
    pub strict_mode: bool,
    pub allow_broadcast: bool,

    // Durable cache settings
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: i64,
    pub cache_max_stale_secs: i64,

    // Live market data settings
    pub live_cache_ttl_secs: i64,
    pub live_allow_stale: bool,

    /// Chain RPC endpoints keyed by canonical chain id (e.g. "eip155:1").
    pub chain_rpc_urls: HashMap<String, String>,

    // Market data sources
    pub aave_source_url: Option<String>,
    pub morpho_source_url: Option<String>,
    pub compound_source_url: Option<String>,
    pub defillama_source_url: String,

    /// Preferred HTTP transport: "builtin" (reqwest) or "curl" (subprocess).
    /// The other transport is the fallback.
    pub http_transport: String,
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => false,
    }
}

fn env_i64(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        // Parse CHAIN_RPC_URLS from environment (optional; RPC-backed actions
        // fail per-request when the chain has no endpoint)
        let chain_rpc_urls: HashMap<String, String> = match env::var("CHAIN_RPC_URLS") {
            Ok(raw) => serde_json::from_str(&raw).context("Invalid CHAIN_RPC_URLS JSON format")?,
            Err(_) => HashMap::new(),
        };

        let allowed_actions = env::var("ALLOWED_ACTIONS").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<String>>()
        });

        let cache_dir = env::var("CACHE_DIR").map(PathBuf::from).ok().or_else(|| {
            dirs::home_dir().map(|mut path| {
                path.push(".chaincore");
                path.push("cache");
                path
            })
        });
        let cache_dir = cache_dir.context("CACHE_DIR not set and home directory unavailable")?;

        // Stale fallback for market fetches is on unless explicitly disabled
        let live_allow_stale = match env::var("LIVE_ALLOW_STALE") {
            Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            Err(_) => true,
        };

        let http_transport = env::var("HTTP_TRANSPORT")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_else(|_| "builtin".to_string());

        Ok(Config {
            allowed_actions,
            strict_mode: env_flag("STRICT_MODE"),
            allow_broadcast: env_flag("ALLOW_BROADCAST"),

            cache_dir,
            cache_ttl_secs: env_i64("CACHE_TTL_SECS", 30)?,
            cache_max_stale_secs: env_i64("CACHE_MAX_STALE_SECS", 600)?,

            live_cache_ttl_secs: env_i64("LIVE_CACHE_TTL_SECS", 120)?,
            live_allow_stale,

            chain_rpc_urls,

            aave_source_url: env::var("AAVE_SOURCE_URL").ok(),
            morpho_source_url: env::var("MORPHO_SOURCE_URL").ok(),
            compound_source_url: env::var("COMPOUND_SOURCE_URL").ok(),
            defillama_source_url: env::var("DEFILLAMA_SOURCE_URL")
                .unwrap_or_else(|_| DEFAULT_DEFILLAMA_URL.to_string()),

            http_transport,
        })
    }

    /// Broadcast is permitted only when ALLOW_BROADCAST is set; strict mode
    /// never re-enables it on its own.
    pub fn broadcast_enabled(&self) -> bool {
        self.allow_broadcast
    }

    /// Direct source URL for a provider name, if one is configured.
    pub fn provider_source_url(&self, provider: &str) -> Option<String> {
        match provider {
            "aave" => self.aave_source_url.clone(),
            "morpho" => self.morpho_source_url.clone(),
            "compound" => self.compound_source_url.clone(),
            "defillama" => Some(self.defillama_source_url.clone()),
            _ => None,
        }
    }

    /// Returns the RPC endpoint for a canonical chain id.
    pub fn rpc_url(&self, chain_id: &str) -> Option<&String> {
        self.chain_rpc_urls.get(chain_id)
    }

    /// Returns the list of configured chain ids, for error messages.
    pub fn configured_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self.chain_rpc_urls.keys().cloned().collect();
        chains.sort();
        chains
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allowed_actions: None,
            strict_mode: false,
            allow_broadcast: false,
            cache_dir: PathBuf::from(".chaincore-cache"),
            cache_ttl_secs: 30,
            cache_max_stale_secs: 600,
            live_cache_ttl_secs: 120,
            live_allow_stale: true,
            chain_rpc_urls: HashMap::new(),
            aave_source_url: None,
            morpho_source_url: None,
            compound_source_url: None,
            defillama_source_url: DEFAULT_DEFILLAMA_URL.to_string(),
            http_transport: "builtin".to_string(),
        }
    }
}
