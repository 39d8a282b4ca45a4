// src/lib.rs

pub mod blockchain;
pub mod cache;
pub mod config;
pub mod http_fetch;
pub mod markets;
pub mod policy;
pub mod proto;
pub mod registry;
pub mod utils;

use cache::DurableCache;
use config::Config;

/// Everything a single invocation needs: the immutable configuration and
/// the durable cache handle. Built once in main, passed by reference into
/// every handler.
pub struct CoreState {
    pub config: Config,
    pub cache: DurableCache,
}

impl CoreState {
    pub fn new(config: Config) -> Self {
        let cache = DurableCache::new(config.cache_dir.clone());
        Self { config, cache }
    }
}
