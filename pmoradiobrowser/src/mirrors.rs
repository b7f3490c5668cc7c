//! Discovery of the live Radio Browser mirrors
//!
//! Radio Browser has no single authoritative endpoint: an aggregator lists
//! the servers of the federation. The list is shuffled once per discovery
//! and cached, so that every request within the cache window tries mirrors
//! in the same order while different processes spread their load.

use crate::error::{Error, Result};
use pmocache::TtlCache;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Aggregator listing the mirrors of the federation
pub const DEFAULT_DISCOVERY_URL: &str = "https://all.api.radio-browser.info/json/servers";

/// Cache key of the mirror list
pub const SERVERS_CACHE_KEY: &str = "servers";

/// Lifetime of a discovered mirror list (1 hour)
pub const DEFAULT_SERVERS_TTL_SECS: u64 = 3600;

/// Timeout of the discovery call
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 5;

/// Known mirrors, used when discovery yields nothing
pub const DEFAULT_FALLBACK_MIRRORS: &[&str] = &[
    "de2.api.radio-browser.info",
    "fi1.api.radio-browser.info",
    "nl1.api.radio-browser.info",
    "us1.api.radio-browser.info",
    "at1.api.radio-browser.info",
    "ru1.api.radio-browser.info",
    "gb1.api.radio-browser.info",
];

/// Source of the ordered mirror list
#[derive(Debug, Clone)]
pub struct MirrorDirectory {
    http: Client,
    cache: TtlCache,
    discovery_url: String,
    fallback: Vec<String>,
    ttl: Duration,
    timeout: Duration,
}

impl MirrorDirectory {
    /// Create a directory
    ///
    /// An empty `fallback` is replaced by [`DEFAULT_FALLBACK_MIRRORS`], so
    /// that [`MirrorDirectory::servers`] can never come back empty.
    pub fn new(
        http: Client,
        cache: TtlCache,
        discovery_url: impl Into<String>,
        fallback: Vec<String>,
    ) -> Self {
        let fallback = if fallback.is_empty() {
            DEFAULT_FALLBACK_MIRRORS.iter().map(|s| s.to_string()).collect()
        } else {
            fallback
        };

        Self {
            http,
            cache,
            discovery_url: discovery_url.into(),
            fallback,
            ttl: Duration::from_secs(DEFAULT_SERVERS_TTL_SECS),
            timeout: Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECS),
        }
    }

    /// Set the lifetime of a discovered list
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the timeout of the discovery call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }

    /// Ordered list of mirror host names, never empty
    ///
    /// Served from the cache while fresh. Otherwise the aggregator is asked,
    /// the fallback list substituted if it yields nothing, and the result
    /// shuffled and cached.
    pub async fn servers(&self) -> Vec<String> {
        if let Some(servers) = self.cache.get_as::<Vec<String>>(SERVERS_CACHE_KEY, self.ttl) {
            if !servers.is_empty() {
                return servers;
            }
        }

        let mut servers = match self.discover().await {
            Ok(servers) => servers,
            Err(e) => {
                warn!("Mirror discovery failed: {}", e);
                Vec::new()
            }
        };

        if servers.is_empty() {
            info!("No mirror discovered, using {} fallback mirrors", self.fallback.len());
            servers = self.fallback.clone();
        }

        servers.shuffle(&mut rand::rng());
        self.cache.set_as(SERVERS_CACHE_KEY, &servers);
        debug!("Mirror order: {:?}", servers);
        servers
    }

    /// Ask the aggregator for the current mirrors
    ///
    /// Entries without a non-empty `name` are skipped, duplicates collapsed.
    async fn discover(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(&self.discovery_url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Discovery(response.status()));
        }

        let body = response.bytes().await?;
        let entries: Vec<Value> = serde_json::from_slice(&body)?;

        let mut seen = HashSet::new();
        let servers = entries
            .iter()
            .filter_map(|entry| entry.get("name")?.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect();

        Ok(servers)
    }
}
