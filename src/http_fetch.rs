// src/http_fetch.rs

//! Dual-transport HTTP fetch.
//!
//! Two interchangeable transports behind one strategy trait: a subprocess
//! `curl` fetch and the built-in reqwest client. The preferred transport is
//! configurable; the other is tried on failure before the source is
//! declared unreachable.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Built-in client transport (reqwest).
pub struct BuiltinTransport {
    client: reqwest::Client,
}

impl BuiltinTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for BuiltinTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for BuiltinTransport {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Failed(format!("HTTP {}", status)));
        }
        resp.text()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))
    }
}

/// Subprocess transport: shells out to curl. The trailing `-w` line carries
/// the HTTP status, since curl's exit code alone cannot distinguish 429.
pub struct CurlTransport;

#[async_trait]
impl HttpTransport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let output = Command::new("curl")
            .args(["-sS", "--max-time", "30", "-w", "\n%{http_code}", url])
            .output()
            .await
            .map_err(|e| FetchError::Failed(format!("failed to spawn curl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Failed(format!(
                "curl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (body, status_line) = match stdout.rsplit_once('\n') {
            Some(parts) => parts,
            None => return Err(FetchError::Failed("curl produced no status line".into())),
        };
        let status: u16 = status_line
            .trim()
            .parse()
            .map_err(|_| FetchError::Failed(format!("unparsable curl status '{}'", status_line)))?;

        if status == 429 {
            return Err(FetchError::RateLimited);
        }
        if !(200..300).contains(&status) {
            return Err(FetchError::Failed(format!("HTTP {}", status)));
        }
        Ok(body.to_string())
    }
}

/// The ordered transport stack. Exactly two transports; the configured
/// preference goes first.
pub struct FetchStack {
    transports: Vec<Box<dyn HttpTransport>>,
}

impl FetchStack {
    pub fn new(prefer: &str) -> Self {
        let transports: Vec<Box<dyn HttpTransport>> = if prefer == "curl" {
            vec![Box::new(CurlTransport), Box::new(BuiltinTransport::new())]
        } else {
            vec![Box::new(BuiltinTransport::new()), Box::new(CurlTransport)]
        };
        Self { transports }
    }

    /// Fetch a URL, falling back to the second transport on any failure.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        Url::parse(url).map_err(|e| FetchError::Failed(format!("invalid source URL: {}", e)))?;

        let mut last_err = FetchError::Failed("no transport attempted".into());
        for transport in &self.transports {
            debug!("fetching {} via {}", url, transport.name());
            match transport.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!("transport {} failed for {}: {}", transport.name(), url, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_orders_the_stack() {
        let stack = FetchStack::new("curl");
        assert_eq!(stack.transports[0].name(), "curl");
        assert_eq!(stack.transports[1].name(), "builtin");

        let stack = FetchStack::new("builtin");
        assert_eq!(stack.transports[0].name(), "builtin");
        assert_eq!(stack.transports[1].name(), "curl");
    }

    #[tokio::test]
    async fn invalid_url_fails_without_attempting_transports() {
        let stack = FetchStack::new("builtin");
        let err = stack.fetch_text("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Failed(_)));
    }
}
