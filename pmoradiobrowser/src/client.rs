//! Failover HTTP client for the Radio Browser mirrors
//!
//! Requests are tried sequentially against the mirrors returned by the
//! [`MirrorDirectory`]: the first mirror answering HTTP 200 with a JSON body
//! wins. Worst-case latency is therefore `timeout × mirror count`.
//!
//! Example:
//!
//! ```no_run
//! use pmoradiobrowser::FailoverClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> pmoradiobrowser::Result<()> {
//!     let client = FailoverClient::builder().build()?;
//!
//!     let countries = client
//!         .request("/json/countries", &[], Duration::from_secs(10))
//!         .await;
//!     println!("{:?}", countries.map(|c| c.as_array().map(Vec::len)));
//!
//!     Ok(())
//! }
//! ```

use crate::error::Result;
use crate::mirrors::{
    MirrorDirectory, DEFAULT_DISCOVERY_TIMEOUT_SECS, DEFAULT_DISCOVERY_URL,
    DEFAULT_FALLBACK_MIRRORS, DEFAULT_SERVERS_TTL_SECS,
};
use crate::models::MirrorStatus;
use futures::future::join_all;
use pmocache::TtlCache;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default per-attempt timeout (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default connect timeout, shorter than the per-attempt timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Timeout of a mirror health probe
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Sent with every request, the aggregator asks clients to identify themselves
pub const DEFAULT_USER_AGENT: &str = "pmoradio-radio-browser/1.0";

/// Endpoint used to probe a mirror
const STATS_PATH: &str = "/json/stats";

/// Radio Browser client with mirror failover
///
/// The client does not cache responses: callers check their
/// [`TtlCache`] first and only call [`FailoverClient::request`] on a miss.
#[derive(Debug, Clone)]
pub struct FailoverClient {
    client: Client,
    mirrors: MirrorDirectory,
    scheme: String,
    timeout: Duration,
    connect_timeout: Duration,
}

impl FailoverClient {
    /// Defaults: public aggregator, in-memory mirror cache, 10 s attempts
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The mirror directory used by this client
    pub fn mirrors(&self) -> &MirrorDirectory {
        &self.mirrors
    }

    /// Default per-attempt timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Connect timeout of the built-in HTTP client, at most half an attempt
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Shared with the logo caches so they reuse the connection pool
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn mirror_url(&self, server: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme, server, path)
    }

    /// Perform a GET on the first mirror able to answer
    ///
    /// Each mirror gets one attempt bounded by `timeout`. A non-200 status,
    /// an unreadable or non-JSON body, a transport error or a timeout moves
    /// on to the next mirror. `None` once every mirror has failed.
    pub async fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Option<Value> {
        let servers = self.mirrors.servers().await;

        for server in &servers {
            let url = self.mirror_url(server, path);
            let result = self
                .client
                .get(&url)
                .query(params)
                .header(ACCEPT, "application/json")
                .timeout(timeout)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!("API {} failed: {}", url, e);
                    continue;
                }
            };

            let status = response.status();
            if status != StatusCode::OK {
                warn!("API {} [{}]", url, status);
                continue;
            }

            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("API {} body read failed: {}", url, e);
                    continue;
                }
            };

            match serde_json::from_slice::<Value>(&body) {
                Ok(Value::Null) => warn!("API {} returned null", url),
                Ok(value) => {
                    debug!("API {} [{}]", url, status);
                    return Some(value);
                }
                Err(e) => warn!("Invalid JSON from {}: {}", url, e),
            }
        }

        warn!("All {} mirrors failed for {}", servers.len(), path);
        None
    }

    /// Probe every mirror concurrently
    ///
    /// A mirror is online when its stats endpoint answers HTTP 200 within
    /// `timeout`; its latency is the round-trip time in milliseconds.
    pub async fn mirror_status(&self, timeout: Duration) -> Vec<MirrorStatus> {
        let servers = self.mirrors.servers().await;
        let probes = servers.iter().map(|server| self.probe(server, timeout));
        join_all(probes).await
    }

    async fn probe(&self, server: &str, timeout: Duration) -> MirrorStatus {
        let url = self.mirror_url(server, STATS_PATH);
        let start = Instant::now();

        let online = match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                false
            }
        };

        let latency_ms = if online {
            start.elapsed().as_millis() as u64
        } else {
            0
        };

        MirrorStatus {
            server: server.to_string(),
            online,
            latency_ms,
            url,
        }
    }
}

/// Options of a [`FailoverClient`]
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    cache: Option<TtlCache>,
    discovery_url: String,
    fallback_mirrors: Vec<String>,
    servers_ttl: Duration,
    discovery_timeout: Duration,
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    scheme: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            cache: None,
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            fallback_mirrors: DEFAULT_FALLBACK_MIRRORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            servers_ttl: Duration::from_secs(DEFAULT_SERVERS_TTL_SECS),
            discovery_timeout: Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECS),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            scheme: "https".to_string(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing `reqwest` client
    ///
    /// The user agent and connect timeout of the builder are then ignored.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Cache holding the mirror list (in memory if not set)
    pub fn cache(mut self, cache: TtlCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the aggregator URL
    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = url.into();
        self
    }

    /// Set the mirrors used when discovery yields nothing
    pub fn fallback_mirrors(mut self, mirrors: Vec<String>) -> Self {
        self.fallback_mirrors = mirrors;
        self
    }

    /// Set the lifetime of the cached mirror list
    pub fn servers_ttl(mut self, ttl: Duration) -> Self {
        self.servers_ttl = ttl;
        self
    }

    /// Set the timeout of the discovery call
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the default per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// User-Agent header sent to the mirrors
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the URL scheme used to reach mirrors (`https` by default)
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Fails only when the `reqwest` client cannot be built
    ///
    /// The connect timeout is capped at half the per-attempt timeout.
    pub fn build(self) -> Result<FailoverClient> {
        let connect_timeout = self.connect_timeout.min(self.timeout / 2);
        if connect_timeout < self.connect_timeout {
            warn!(
                "Connect timeout {:?} not shorter than attempt timeout {:?}, using {:?}",
                self.connect_timeout, self.timeout, connect_timeout
            );
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .connect_timeout(connect_timeout)
                .build()?,
        };

        let cache = self.cache.unwrap_or_else(TtlCache::in_memory);
        let mirrors = MirrorDirectory::new(
            client.clone(),
            cache,
            self.discovery_url,
            self.fallback_mirrors,
        )
        .with_ttl(self.servers_ttl)
        .with_timeout(self.discovery_timeout);

        Ok(FailoverClient {
            client,
            mirrors,
            scheme: self.scheme,
            timeout: self.timeout,
            connect_timeout,
        })
    }
}
