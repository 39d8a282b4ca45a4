// src/markets/providers.rs

//! Provider selection for the live market data engine.
//!
//! A request resolves to an ordered list of candidate providers: a forced
//! provider stands alone (no silent fallback), while auto mode tries a
//! configured direct-source hint before the aggregator.

use crate::config::Config;
use crate::markets::models::ProviderChoice;
use crate::proto::protocol::CoreError;

/// Providers with dedicated source endpoints.
pub const DIRECT_PROVIDERS: &[&str] = &["aave", "morpho", "compound"];

/// The aggregator every auto-mode request can fall back to.
pub const AGGREGATOR: &str = "defillama";

/// One candidate: a provider name and its resolved source URL, or `None`
/// when the required configuration is absent.
#[derive(Debug, Clone)]
pub struct ProviderSource {
    pub name: String,
    pub url: Option<String>,
}

pub fn is_direct_provider(name: &str) -> bool {
    DIRECT_PROVIDERS.iter().any(|p| *p == name)
}

/// Resolve the candidate list once per request.
pub fn resolve_selection(
    choice: &ProviderChoice,
    hint: Option<&str>,
    config: &Config,
) -> Result<Vec<ProviderSource>, CoreError> {
    match choice {
        ProviderChoice::Forced(name) => {
            if !is_direct_provider(name) && name != AGGREGATOR {
                return Err(CoreError::usage(format!(
                    "Unknown provider '{}'; known providers: {}, {}",
                    name,
                    DIRECT_PROVIDERS.join(", "),
                    AGGREGATOR
                )));
            }
            Ok(vec![ProviderSource {
                name: name.clone(),
                url: config.provider_source_url(name),
            }])
        }
        ProviderChoice::Auto => {
            let mut selection = Vec::new();
            if let Some(hint) = hint {
                let hint = hint.trim().to_lowercase();
                if is_direct_provider(&hint) {
                    if let Some(url) = config.provider_source_url(&hint) {
                        selection.push(ProviderSource {
                            name: hint,
                            url: Some(url),
                        });
                    }
                }
            }
            selection.push(ProviderSource {
                name: AGGREGATOR.to_string(),
                url: Some(config.defillama_source_url.clone()),
            });
            Ok(selection)
        }
    }
}
