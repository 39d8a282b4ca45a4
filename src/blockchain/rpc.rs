// src/blockchain/rpc.rs

//! RPC-cached reader.
//!
//! Wraps read-only JSON-RPC calls with the durable cache: fresh records
//! short-circuit the network (unless strict mode), successful live reads
//! refresh the cache, and upstream failures fall back to a stale record
//! while it is within the method's stale budget.

use std::collections::HashMap;

use chrono::Utc;
use lazy_static::lazy_static;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::DurableCache;
use crate::config::Config;
use crate::proto::protocol::CoreError;

/// Canonical spellings of the RPC methods we recognize. Callers using odd
/// casing still land on the same cache key and policy bucket.
const CANONICAL_METHODS: &[&str] = &[
    "eth_blockNumber",
    "eth_gasPrice",
    "eth_estimateGas",
    "eth_getBalance",
    "eth_call",
    "eth_chainId",
    "eth_getCode",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "eth_sendRawTransaction",
];

pub fn canonical_method(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    for canonical in CANONICAL_METHODS {
        if canonical.to_lowercase() == lowered {
            return canonical.to_string();
        }
    }
    name.trim().to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct MethodPolicy {
    pub ttl_secs: i64,
    pub max_stale_secs: i64,
    pub allow_stale: bool,
}

lazy_static! {
    // Bespoke TTLs for the latency-relevant read methods; everything else
    // inherits the process-wide defaults.
    static ref METHOD_TTLS: HashMap<&'static str, i64> = {
        let mut m = HashMap::new();
        m.insert("eth_blockNumber", 5);
        m.insert("eth_gasPrice", 15);
        m.insert("eth_estimateGas", 15);
        m.insert("eth_getBalance", 30);
        m.insert("eth_call", 30);
        m
    };
}

/// Result of a cached read, tagged with where the bytes came from.
#[derive(Debug, Clone)]
pub struct RpcRead {
    pub value: Value,
    pub source: &'static str,
}

pub struct CachedRpcReader<'a> {
    config: &'a Config,
    cache: &'a DurableCache,
    client: Client,
}

impl<'a> CachedRpcReader<'a> {
    pub fn new(config: &'a Config, cache: &'a DurableCache) -> Self {
        Self {
            config,
            cache,
            client: Client::new(),
        }
    }

    pub fn policy_for(&self, canonical: &str) -> MethodPolicy {
        MethodPolicy {
            ttl_secs: METHOD_TTLS
                .get(canonical)
                .copied()
                .unwrap_or(self.config.cache_ttl_secs),
            max_stale_secs: self.config.cache_max_stale_secs,
            allow_stale: true,
        }
    }

    /// Cached read of one logical RPC call. The cache key covers endpoint,
    /// canonical method, and the serialized params.
    pub async fn read(
        &self,
        endpoint: &str,
        method: &str,
        params: &Value,
    ) -> Result<RpcRead, CoreError> {
        let method = canonical_method(method);
        let policy = self.policy_for(&method);
        let params_repr = serde_json::to_string(params)
            .map_err(|e| CoreError::Internal(format!("unencodable params: {}", e)))?;
        let key = format!("rpc:{}:{}:{}", endpoint, method, params_repr);

        let now = Utc::now().timestamp();
        let cached = self.cache.get(&key);
        let had_fresh = cached.as_ref().map(|r| r.is_fresh(now)).unwrap_or(false);

        if !self.config.strict_mode {
            if let Some(record) = cached.as_ref().filter(|r| r.is_fresh(now)) {
                debug!("cache hit for {} on {}", method, endpoint);
                return Ok(RpcRead {
                    value: record.value.clone(),
                    source: "cache_hit",
                });
            }
        }

        match self.call_live(endpoint, &method, params).await {
            Ok(result) => {
                if let Err(e) = self.cache.put(&key, policy.ttl_secs, &result) {
                    warn!("failed to cache {} result: {}", method, e);
                }
                Ok(RpcRead {
                    value: result,
                    source: if had_fresh { "cache_refresh" } else { "fresh" },
                })
            }
            Err(err) => {
                if policy.allow_stale {
                    if let Some(record) = cached {
                        if record.within_stale_budget(now, policy.max_stale_secs) {
                            warn!(
                                "upstream failed for {} ({}); serving stale record",
                                method, err
                            );
                            return Ok(RpcRead {
                                value: record.value,
                                source: "stale",
                            });
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Relay a signed transaction. Never cached.
    pub async fn send_raw(&self, endpoint: &str, raw_tx: &str) -> Result<Value, CoreError> {
        self.call_live(endpoint, "eth_sendRawTransaction", &json!([raw_tx]))
            .await
    }

    async fn call_live(
        &self,
        endpoint: &str,
        method: &str,
        params: &Value,
    ) -> Result<Value, CoreError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        let resp = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::Unavailable(format!("RPC endpoint unreachable: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(CoreError::RateLimited("RPC endpoint rate limited".into()));
        }
        if !status.is_success() {
            return Err(CoreError::Unavailable(format!(
                "RPC endpoint returned HTTP {}",
                status
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::Unavailable(format!("invalid RPC response body: {}", e)))?;
        if let Some(err) = body.get("error") {
            return Err(CoreError::Unavailable(format!("{} error: {}", method, err)));
        }
        match body.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(CoreError::Unavailable(format!(
                "RPC response missing 'result' field for {}",
                method
            ))),
        }
    }
}

/// Convert a 0x-hex quantity to a decimal string.
pub fn hex_quantity_to_decimal(value: &Value) -> Result<String, CoreError> {
    let s = value
        .as_str()
        .ok_or_else(|| CoreError::Unavailable("RPC quantity is not a string".into()))?;
    let body = s.strip_prefix("0x").unwrap_or(s);
    let n = ethers_core::types::U256::from_str_radix(body, 16)
        .map_err(|_| CoreError::Unavailable(format!("unparsable RPC quantity '{}'", s)))?;
    Ok(n.to_string())
}
