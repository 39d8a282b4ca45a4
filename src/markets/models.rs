// src/markets/models.rs

use serde::Serialize;
use serde_json::Value;

use crate::proto::protocol::CoreError;
use crate::registry::ChainInfo;

/// How much the caller insists on live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveMode {
    /// Live if possible, bundled registry as the final fallback
    Auto,
    /// Live data (fresh or stale) or an error
    Live,
    /// Bundled registry only; no network calls at all
    Registry,
}

impl LiveMode {
    pub fn parse(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(|s| s.trim().to_lowercase()) {
            None => Ok(LiveMode::Auto),
            Some(s) => match s.as_str() {
                "auto" | "" => Ok(LiveMode::Auto),
                "live" => Ok(LiveMode::Live),
                "registry" => Ok(LiveMode::Registry),
                other => Err(CoreError::usage(format!(
                    "Argument 'liveMode' must be one of auto|live|registry, got '{}'",
                    other
                ))),
            },
        }
    }
}

/// Provider selection mode: auto-resolve, or one forced provider with no
/// silent fallback.
#[derive(Debug, Clone)]
pub enum ProviderChoice {
    Auto,
    Forced(String),
}

impl ProviderChoice {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => ProviderChoice::Auto,
            Some(s) => {
                let s = s.trim().to_lowercase();
                if s.is_empty() || s == "auto" {
                    ProviderChoice::Auto
                } else {
                    ProviderChoice::Forced(s)
                }
            }
        }
    }
}

/// One market query, fully parsed.
#[derive(Debug, Clone)]
pub struct MarketQuery {
    pub chain: Option<&'static ChainInfo>,
    pub asset: Option<String>,
    /// Provider filter; doubles as the selection hint in auto mode
    pub provider: Option<String>,
    pub live_mode: LiveMode,
    pub provider_choice: ProviderChoice,
    /// Borrow-side orientation (`lendingMarkets`)
    pub borrow_side: bool,
    pub limit: usize,
}

/// Request-level provenance, defaulted onto every row that does not carry
/// its own.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source: String,
    pub source_provider: String,
    pub fetched_at_unix: i64,
}

/// One normalized market row, provider-agnostic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRow {
    pub market: String,
    /// Protocol the market belongs to (e.g. "aave-v3")
    pub provider: String,
    pub chain: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apy_base: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apy_reward: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apy_borrow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvl_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
    pub source: String,
    pub source_provider: String,
    pub fetched_at_unix: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<&'static str>,
}

/// A page of rows plus the request-level provenance they defaulted from.
#[derive(Debug, Clone)]
pub struct MarketPage {
    pub rows: Vec<MarketRow>,
    pub provenance: Provenance,
}

/// Numeric field that may arrive as a JSON number or a numeric string.
pub fn field_f64(row: &Value, key: &str) -> Option<f64> {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
