// src/markets/mod.rs

//! Live market data engine.
//!
//! Resolves a yield/lending query against an ordered provider chain
//! (direct provider, then aggregator), fetches through the fresh/stale
//! cache discipline with dual-transport HTTP, and falls back to the
//! bundled market registry when the overall mode allows it.

pub mod models;
pub mod providers;
pub mod registry;

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::DurableCache;
use crate::config::Config;
use crate::http_fetch::{FetchError, FetchStack};
use crate::proto::protocol::CoreError;
use crate::registry::{symbol_matches, MatchKind};

use models::{field_f64, LiveMode, MarketPage, MarketQuery, MarketRow, Provenance, ProviderChoice};
use providers::{resolve_selection, ProviderSource};

pub struct MarketsEngine<'a> {
    config: &'a Config,
    cache: &'a DurableCache,
    fetcher: FetchStack,
}

impl<'a> MarketsEngine<'a> {
    pub fn new(config: &'a Config, cache: &'a DurableCache) -> Self {
        Self {
            config,
            cache,
            fetcher: FetchStack::new(&config.http_transport),
        }
    }

    pub async fn query(&self, query: &MarketQuery) -> Result<MarketPage, CoreError> {
        let now = Utc::now().timestamp();

        if query.live_mode == LiveMode::Registry {
            return Ok(self.registry_page(query, now));
        }

        let selection =
            resolve_selection(&query.provider_choice, query.provider.as_deref(), self.config)?;

        let mut last_err =
            CoreError::Unavailable("no market data provider available".to_string());
        for source in &selection {
            match self.fetch_source(source).await {
                Ok((body, tag)) => {
                    let provenance = Provenance {
                        source: tag.to_string(),
                        source_provider: source.name.clone(),
                        fetched_at_unix: now,
                    };
                    let rows = normalize_and_filter(&body, &source.name, query, &provenance)?;
                    return Ok(MarketPage { rows, provenance });
                }
                Err(e) => {
                    warn!("provider {} failed: {}", source.name, e);
                    last_err = e;
                }
            }
        }

        // A forced provider never falls back anywhere; auto mode may still
        // serve the bundled registry.
        let forced = matches!(query.provider_choice, ProviderChoice::Forced(_));
        if !forced && query.live_mode == LiveMode::Auto {
            info!("all live sources failed; serving bundled registry");
            return Ok(self.registry_page(query, now));
        }
        Err(last_err)
    }

    /// Fetch one provider's source through the fresh/stale cache discipline,
    /// keyed by provider name and a hash of the resolved URL.
    async fn fetch_source(
        &self,
        source: &ProviderSource,
    ) -> Result<(Value, &'static str), CoreError> {
        let url = source.url.as_ref().ok_or_else(|| {
            CoreError::Unavailable(format!("provider unavailable: {}", source.name))
        })?;

        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        let key = format!("live:{}:{}", source.name, &digest[..16]);

        let now = Utc::now().timestamp();
        let cached = self.cache.get(&key);
        let had_fresh = cached.as_ref().map(|r| r.is_fresh(now)).unwrap_or(false);

        if !self.config.strict_mode {
            if let Some(record) = cached.as_ref().filter(|r| r.is_fresh(now)) {
                debug!("live cache hit for {}", source.name);
                return Ok((record.value.clone(), "cache_hit"));
            }
        }

        let live: Result<Value, CoreError> = match self.fetcher.fetch_text(url).await {
            Ok(body) => serde_json::from_str::<Value>(&body)
                .map_err(|e| {
                    CoreError::Unavailable(format!(
                        "provider {} returned invalid JSON: {}",
                        source.name, e
                    ))
                })
                .and_then(|parsed| {
                    // Shape check before the record is cached
                    match extract_rows(&parsed) {
                        Ok(_) => Ok(parsed),
                        Err(e) => Err(e),
                    }
                }),
            Err(FetchError::RateLimited) => Err(CoreError::RateLimited(format!(
                "provider {} rate limited",
                source.name
            ))),
            Err(FetchError::Failed(msg)) => Err(CoreError::Unavailable(format!(
                "provider {} unreachable: {}",
                source.name, msg
            ))),
        };

        match live {
            Ok(parsed) => {
                if let Err(e) = self.cache.put(&key, self.config.live_cache_ttl_secs, &parsed) {
                    warn!("failed to cache {} response: {}", source.name, e);
                }
                Ok((parsed, if had_fresh { "cache_refresh" } else { "fresh" }))
            }
            Err(err) => {
                if self.config.live_allow_stale {
                    if let Some(record) = cached {
                        if record.within_stale_budget(now, self.config.cache_max_stale_secs) {
                            warn!(
                                "live fetch for {} failed ({}); serving stale record",
                                source.name, err
                            );
                            return Ok((record.value, "stale"));
                        }
                    }
                }
                Err(err)
            }
        }
    }

    fn registry_page(&self, query: &MarketQuery, now: i64) -> MarketPage {
        let provenance = Provenance {
            source: "registry".to_string(),
            source_provider: "registry".to_string(),
            fetched_at_unix: now,
        };
        let mut rows: Vec<MarketRow> = registry::STATIC_MARKETS
            .iter()
            .filter_map(|m| {
                let chain_ok = match query.chain {
                    Some(chain) => chain.name == m.chain,
                    None => true,
                };
                if !chain_ok {
                    return None;
                }
                let match_kind = match &query.asset {
                    Some(asset) => Some(best_symbol_match(asset, m.symbol)?),
                    None => None,
                };
                if let Some(filter) = &query.provider {
                    if !provider_name_matches(filter, m.provider) {
                        return None;
                    }
                }
                if query.borrow_side && m.apy_borrow.is_none() {
                    return None;
                }
                Some(MarketRow {
                    market: m.market.to_string(),
                    provider: m.provider.to_string(),
                    chain: m.chain.to_string(),
                    symbol: m.symbol.to_string(),
                    apy: Some(m.apy),
                    apy_base: Some(m.apy_base),
                    apy_reward: Some(m.apy_reward),
                    apy_borrow: m.apy_borrow,
                    tvl_usd: Some(m.tvl_usd),
                    utilization: None,
                    source: provenance.source.clone(),
                    source_provider: provenance.source_provider.clone(),
                    fetched_at_unix: provenance.fetched_at_unix,
                    match_kind: match_kind.map(|k| k.as_str()),
                })
            })
            .collect();
        sort_rows(&mut rows, query.borrow_side);
        rows.truncate(query.limit);
        MarketPage { rows, provenance }
    }
}

/// The rows array inside an upstream body: either `{"data": [...]}` or a
/// bare array. Anything else is an upstream shape error, never a panic.
fn extract_rows(body: &Value) -> Result<&Vec<Value>, CoreError> {
    if let Some(rows) = body.get("data").and_then(|d| d.as_array()) {
        return Ok(rows);
    }
    if let Some(rows) = body.as_array() {
        return Ok(rows);
    }
    Err(CoreError::Unavailable(
        "unexpected market data shape: no rows array".to_string(),
    ))
}

/// Best match of a filter against a possibly composite symbol
/// ("USDC-WETH"): exact beats family.
fn best_symbol_match(filter: &str, symbol: &str) -> Option<MatchKind> {
    let mut best: Option<MatchKind> = None;
    for part in symbol.split(['-', '/']) {
        match symbol_matches(filter, part) {
            Some(MatchKind::Exact) => return Some(MatchKind::Exact),
            Some(MatchKind::Family) => best = Some(MatchKind::Family),
            None => {}
        }
    }
    best
}

/// "aave" matches "aave" and "aave-v3".
fn provider_name_matches(filter: &str, project: &str) -> bool {
    let filter = filter.trim().to_lowercase();
    let project = project.trim().to_lowercase();
    project == filter || project.starts_with(&format!("{}-", filter))
}

fn sort_rows(rows: &mut [MarketRow], borrow_side: bool) {
    if borrow_side {
        // Cheapest borrow first
        rows.sort_by(|a, b| {
            let a = a.apy_borrow.unwrap_or(f64::MAX);
            let b = b.apy_borrow.unwrap_or(f64::MAX);
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        // Highest yield first
        rows.sort_by(|a, b| {
            let a = a.apy.unwrap_or(f64::MIN);
            let b = b.apy.unwrap_or(f64::MIN);
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

fn normalize_and_filter(
    body: &Value,
    provider_name: &str,
    query: &MarketQuery,
    provenance: &Provenance,
) -> Result<Vec<MarketRow>, CoreError> {
    let raw_rows = extract_rows(body)?;
    let mut rows = Vec::new();

    for raw in raw_rows {
        let symbol = match raw.get("symbol").and_then(|s| s.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => continue,
        };
        let row_chain = raw
            .get("chain")
            .and_then(|c| c.as_str())
            .unwrap_or("unknown")
            .to_string();
        let project = raw
            .get("project")
            .or_else(|| raw.get("protocol"))
            .and_then(|p| p.as_str())
            .unwrap_or(provider_name)
            .to_string();

        // Filters
        if let Some(chain) = query.chain {
            let matches = row_chain.eq_ignore_ascii_case(chain.aggregator_name)
                || row_chain.eq_ignore_ascii_case(chain.name)
                || row_chain == chain.id;
            if !matches {
                continue;
            }
        }
        let match_kind = match &query.asset {
            Some(asset) => match best_symbol_match(asset, &symbol) {
                Some(kind) => Some(kind),
                None => continue,
            },
            None => None,
        };
        if let Some(filter) = &query.provider {
            if !provider_name_matches(filter, &project) {
                continue;
            }
        }

        let apy_borrow = field_f64(raw, "apyBorrow")
            .or_else(|| field_f64(raw, "apyBaseBorrow"))
            .or_else(|| field_f64(raw, "borrowApy"));
        if query.borrow_side && apy_borrow.is_none() {
            continue;
        }

        let tvl_usd = field_f64(raw, "tvlUsd")
            .or_else(|| field_f64(raw, "totalSupplyUsd"))
            .or_else(|| field_f64(raw, "tvl"));
        let utilization = field_f64(raw, "utilization").or_else(|| {
            match (field_f64(raw, "totalBorrowUsd"), field_f64(raw, "totalSupplyUsd")) {
                (Some(borrow), Some(supply)) if supply > 0.0 => Some(borrow / supply),
                _ => None,
            }
        });

        let market = raw
            .get("pool")
            .or_else(|| raw.get("market"))
            .and_then(|p| p.as_str())
            .map(|p| p.to_string())
            .unwrap_or_else(|| format!("{}:{}:{}", project, row_chain, symbol));

        // Row-level provenance overrides the request-level defaults
        let source = raw
            .get("source")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| provenance.source.clone());
        let source_provider = raw
            .get("sourceProvider")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| provenance.source_provider.clone());
        let fetched_at_unix = raw
            .get("fetchedAtUnix")
            .and_then(|v| v.as_i64())
            .unwrap_or(provenance.fetched_at_unix);

        rows.push(MarketRow {
            market,
            provider: project,
            chain: row_chain,
            symbol,
            apy: field_f64(raw, "apy").or_else(|| field_f64(raw, "supplyApy")),
            apy_base: field_f64(raw, "apyBase").or_else(|| field_f64(raw, "baseApy")),
            apy_reward: field_f64(raw, "apyReward").or_else(|| field_f64(raw, "rewardApy")),
            apy_borrow,
            tvl_usd,
            utilization,
            source,
            source_provider,
            fetched_at_unix,
            match_kind: match_kind.map(|k| k.as_str()),
        });
    }

    sort_rows(&mut rows, query.borrow_side);
    rows.truncate(query.limit);
    Ok(rows)
}
