// src/cache.rs

//! Durable, TTL-based key/value cache.
//!
//! Keys hash to fixed-width filenames under one directory; records carry an
//! absolute expiry. Records past their TTL stay readable for callers that
//! accept staleness. Concurrent invocations may race on a key; the contract
//! is last-writer-wins, with no locking.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub expires_at_unix: i64,
    pub value: Value,
}

impl CacheRecord {
    pub fn is_fresh(&self, now_unix: i64) -> bool {
        now_unix <= self.expires_at_unix
    }

    /// Usable past expiry while within the stale budget.
    pub fn within_stale_budget(&self, now_unix: i64, max_stale_secs: i64) -> bool {
        now_unix <= self.expires_at_unix + max_stale_secs
    }
}

#[derive(Debug, Clone)]
pub struct DurableCache {
    dir: PathBuf,
}

impl DurableCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create cache directory {}: {}", dir.display(), e);
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Write a record, overwriting any existing one. The only lifecycle
    /// events are this overwrite and expiry; nothing ever deletes records.
    pub fn put(&self, key: &str, ttl_secs: i64, value: &Value) -> anyhow::Result<()> {
        let record = CacheRecord {
            expires_at_unix: Utc::now().timestamp() + ttl_secs,
            value: value.clone(),
        };
        let path = self.path_for(key);
        let body = serde_json::to_vec(&record)?;
        fs::write(&path, body)?;
        debug!("cache put {} -> {}", key, path.display());
        Ok(())
    }

    /// Read a record. Absent or corrupt files both read as `None`;
    /// corruption is never fatal.
    pub fn get(&self, key: &str) -> Option<CacheRecord> {
        let path = self.path_for(key);
        let body = fs::read(&path).ok()?;
        match serde_json::from_slice::<CacheRecord>(&body) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Corrupt cache record at {}: {}", path.display(), e);
                None
            }
        }
    }
}
