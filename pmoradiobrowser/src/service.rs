//! Operations exposed to the UI
//!
//! [`RadioBrowser`] wires the failover client, the response cache, the logo
//! caches, the recently played ledger and the collaborators together. Every
//! operation returns an [`Envelope`]; nothing here returns an error.

use crate::client::{FailoverClient, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::custom_apis::{CustomApiRegistry, DEFAULT_API_TYPE};
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::favorites::{FavoriteStation, FavoritesStore, SqliteFavorites};
use crate::ledger::{RecentEntry, RecentlyPlayed};
use crate::maintenance::{MaintenanceError, MaintenanceRunner, ScriptRunner};
use crate::models::{
    SearchFilters, Station, DEFAULT_SEARCH_LIMIT, DEFAULT_STATION_NAME, LOCAL_LOGO,
    UNKNOWN_STATION_NAME,
};
use crate::player::{NoPlayer, Player, PlayerError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use pmocache::{params_key, TtlCache};
use pmocovers::{LogoCache, PermanentLogos};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Freshness of search results (30 minutes)
pub const DEFAULT_SEARCH_TTL_SECS: u64 = 1800;

/// Freshness of countries, genres and top stations (24 hours)
pub const DEFAULT_STATIC_TTL_SECS: u64 = 86400;

/// Favorites shown when nothing has been played yet
const RECENT_FALLBACK_LIMIT: usize = 10;

/// Favicons proxied by Google thumbnails are never fetched
const GOOGLE_THUMBNAIL_HOST: &str = "encrypted-tbn0.gstatic.com";

/// Public path of the permanent logos
pub const PERMANENT_LOGOS_PREFIX: &str = "/radio-logos";

const MSG_NO_RESULTS: &str = "No results or API error";
const MSG_NO_STATION: &str = "No station data";
const MSG_PLAYER_UNAVAILABLE: &str = "Cannot connect to player";

/// Favicons downloaded at the same time
const LOGO_FETCH_CONCURRENCY: usize = 8;

fn logo_miss_key(favicon: &str) -> String {
    params_key("logo_miss", [("url", favicon)])
}

fn usable_favicon(favicon: &str) -> bool {
    !favicon.is_empty() && !favicon.contains(GOOGLE_THUMBNAIL_HOST)
}

/// Cache lifetimes of the directory data
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub search: Duration,
    pub static_data: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            search: Duration::from_secs(DEFAULT_SEARCH_TTL_SECS),
            static_data: Duration::from_secs(DEFAULT_STATIC_TTL_SECS),
        }
    }
}

/// Radio Browser service
pub struct RadioBrowser {
    client: FailoverClient,
    cache: TtlCache,
    ttls: CacheTtls,
    logos: Option<LogoCache>,
    permanent_logos: Option<PermanentLogos>,
    ledger: RecentlyPlayed,
    favorites: Arc<dyn FavoritesStore>,
    custom_apis: CustomApiRegistry,
    player: Arc<dyn Player>,
    maintenance: Arc<dyn MaintenanceRunner>,
}

impl std::fmt::Debug for RadioBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioBrowser")
            .field("client", &self.client)
            .field("ledger", &self.ledger)
            .field("custom_apis", &self.custom_apis)
            .finish_non_exhaustive()
    }
}

impl RadioBrowser {
    /// Start building a service
    ///
    /// `data_dir` holds what must survive a cache flush: the recently played
    /// ledger, the custom API registry and, unless another store is given,
    /// the favorites database.
    pub fn builder<P: AsRef<Path>>(client: FailoverClient, cache: TtlCache, data_dir: P) -> RadioBrowserBuilder {
        RadioBrowserBuilder {
            client,
            cache,
            data_dir: data_dir.as_ref().to_path_buf(),
            ttls: CacheTtls::default(),
            logos: None,
            permanent_logos: None,
            favorites: None,
            player: None,
            maintenance: None,
        }
    }

    pub fn client(&self) -> &FailoverClient {
        &self.client
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn logos(&self) -> Option<&LogoCache> {
        self.logos.as_ref()
    }

    pub fn permanent_logos(&self) -> Option<&PermanentLogos> {
        self.permanent_logos.as_ref()
    }

    pub fn ledger(&self) -> &RecentlyPlayed {
        &self.ledger
    }

    // ========================================================================
    // Directory data
    // ========================================================================

    /// Cache-first fetch of a directory endpoint
    ///
    /// With `stale_fallback`, an expired entry is served when every mirror
    /// fails.
    async fn cached_request(
        &self,
        key: &str,
        path: &str,
        params: &[(&str, String)],
        ttl: Duration,
        stale_fallback: bool,
    ) -> Option<Value> {
        if let Some(value) = self.cache.get(key, ttl) {
            debug!("Cache hit for {}", key);
            return Some(value);
        }

        match self.client.request(path, params, self.client.timeout()).await {
            Some(value) => {
                self.cache.set(key, value.clone());
                Some(value)
            }
            None if stale_fallback => {
                let stale = self.cache.get_stale(key);
                if stale.is_some() {
                    info!("Serving stale {} after upstream failure", key);
                }
                stale
            }
            None => None,
        }
    }

    /// Replace each station favicon by its local copy when it can be cached
    ///
    /// Downloads run concurrently. A favicon that could not be cached is
    /// remembered for the static TTL and left untouched until then, so a
    /// cached search stays off the network.
    async fn localize_favicons(&self, mut stations: Value) -> Value {
        let Some(logos) = &self.logos else {
            return stations;
        };

        if let Value::Array(items) = &mut stations {
            let wanted: Vec<(usize, String)> = items
                .iter()
                .enumerate()
                .filter_map(|(index, station)| {
                    let favicon = station.get("favicon").and_then(Value::as_str)?;
                    (usable_favicon(favicon) && !self.logo_failed_recently(favicon))
                        .then(|| (index, favicon.to_string()))
                })
                .collect();

            let fetched: Vec<(usize, String, Option<String>)> = stream::iter(wanted)
                .map(|(index, favicon)| async move {
                    let local = logos.fetch_and_cache(&favicon).await;
                    (index, favicon, local)
                })
                .buffer_unordered(LOGO_FETCH_CONCURRENCY)
                .collect()
                .await;

            for (index, favicon, local) in fetched {
                match local {
                    Some(local) => items[index]["favicon"] = Value::String(local),
                    None => {
                        debug!("Remembering logo failure for {}", favicon);
                        self.cache.set(&logo_miss_key(&favicon), Value::Bool(true));
                    }
                }
            }
        }
        stations
    }

    fn logo_failed_recently(&self, favicon: &str) -> bool {
        self.cache
            .get(&logo_miss_key(favicon), self.ttls.static_data)
            .is_some()
    }

    /// Search stations
    ///
    /// Blank criteria are ignored; paging and ordering get their defaults.
    /// Results are cached for the search TTL, keyed by the canonical
    /// parameter set.
    pub async fn search(&self, filters: &SearchFilters) -> Envelope {
        let params = filters.to_params();
        let key = params_key("search", params.iter().map(|(k, v)| (*k, v.as_str())));

        match self
            .cached_request(&key, "/json/stations/search", &params, self.ttls.search, false)
            .await
        {
            Some(stations) => {
                Envelope::ok().with("stations", self.localize_favicons(stations).await)
            }
            None => Envelope::failure(MSG_NO_RESULTS),
        }
    }

    /// Most clicked stations
    ///
    /// Falls back to an expired cached list when the directory is down.
    pub async fn top_stations(&self, limit: Option<u32>) -> Envelope {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let key = format!("top_click_{limit}");
        let path = format!("/json/stations/topclick/{limit}");

        match self
            .cached_request(&key, &path, &[], self.ttls.static_data, true)
            .await
        {
            Some(stations) => {
                Envelope::ok().with("stations", self.localize_favicons(stations).await)
            }
            None => Envelope::failure(MSG_NO_RESULTS),
        }
    }

    /// Countries known to the directory
    pub async fn countries(&self) -> Envelope {
        match self
            .cached_request("countries", "/json/countries", &[], self.ttls.static_data, false)
            .await
        {
            Some(countries) => Envelope::ok().with("countries", countries),
            None => Envelope::failure(MSG_NO_RESULTS),
        }
    }

    /// Tags known to the directory
    pub async fn genres(&self) -> Envelope {
        match self
            .cached_request("genres", "/json/tags", &[], self.ttls.static_data, false)
            .await
        {
            Some(genres) => Envelope::ok().with("genres", genres),
            None => Envelope::failure(MSG_NO_RESULTS),
        }
    }

    /// Reachability and latency of every mirror
    pub async fn mirror_status(&self) -> Envelope {
        let servers = self
            .client
            .mirror_status(Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
            .await;
        Envelope::ok().with("servers", servers)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Recently played stations, most recent first
    ///
    /// Before anything has been played, the newest favorites are shown.
    pub async fn recently_played(&self) -> Envelope {
        let entries = self.ledger.list().await;
        if !entries.is_empty() {
            debug!("Recently played from ledger: {} stations", entries.len());
            return Envelope::ok().with("stations", entries);
        }

        let stations = match self.favorites.newest(RECENT_FALLBACK_LIMIT) {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!("Cannot read favorites: {}", e);
                Vec::new()
            }
        };
        debug!("Recently played from favorites: {} stations", stations.len());
        Envelope::ok().with("stations", stations)
    }

    /// Record the station as played, then hand it to the player
    pub async fn play(&self, station: &Station) -> Envelope {
        let Some(url) = station.stream_url() else {
            return Envelope::failure(MSG_NO_STATION);
        };
        let name = station.display_name().unwrap_or(DEFAULT_STATION_NAME);
        let logo = station.favicon_url().unwrap_or(LOCAL_LOGO);

        if let Err(e) = self.ledger.record(RecentEntry::new(url, name, logo)).await {
            warn!("Cannot update recently played: {}", e);
        }

        if let Err(e) = self.player.clear().await {
            return player_failure("clear", e);
        }
        if let Err(e) = self.player.add(url).await {
            return player_failure("add", e);
        }
        if let Err(e) = self.player.play().await {
            return player_failure("play", e);
        }

        info!("Playing {} ({})", name, url);
        Envelope::ok_with(format!("Playing: {name}"))
    }

    /// Stop playback
    pub async fn stop(&self) -> Envelope {
        match self.player.stop().await {
            Ok(()) => {
                info!("Playback stopped");
                Envelope::ok_with("Playback stopped")
            }
            Err(e) => player_failure("stop", e),
        }
    }

    /// Whether the player is playing, and what
    pub async fn current_status(&self) -> Envelope {
        match self.player.status().await {
            Ok(status) => Envelope::ok()
                .with("is_playing", status.playing)
                .with("current_url", status.current_url),
            Err(e) => player_failure("status", e),
        }
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    /// Add a station to the favorites, with a permanent logo when possible
    pub async fn add_favorite(&self, station: &Station) -> Envelope {
        let Some(url) = station.stream_url() else {
            return Envelope::failure(MSG_NO_STATION);
        };
        let name = station.display_name().unwrap_or(UNKNOWN_STATION_NAME);

        match self.favorites.contains_name(name) {
            Ok(true) => return Envelope::failure("Station already in favorites"),
            Ok(false) => {}
            Err(e) => {
                warn!("Cannot read favorites: {}", e);
                return Envelope::failure("Failed to add station to favorites");
            }
        }

        let mut logo = LOCAL_LOGO.to_string();
        if let (Some(importer), Some(favicon)) = (&self.permanent_logos, station.favicon_url()) {
            if usable_favicon(favicon) {
                if let Some(set) = importer.import(name, favicon).await {
                    if let Some(file) = set.main.file_name() {
                        logo = file.to_string_lossy().into_owned();
                    }
                }
            }
        }

        let favorite = FavoriteStation {
            url: url.to_string(),
            name: name.to_string(),
            logo,
        };
        match self.favorites.add(&favorite) {
            Ok(()) => Envelope::ok_with("Station added to Radio"),
            Err(e) => {
                warn!("Cannot add favorite {}: {}", name, e);
                Envelope::failure("Failed to add station to favorites")
            }
        }
    }

    /// Remove every favorite with this stream URL
    pub async fn remove_favorite(&self, url: &str) -> Envelope {
        let url = url.trim();
        if url.is_empty() {
            return Envelope::failure(MSG_NO_STATION);
        }

        match self.favorites.remove(url) {
            Ok(_) => Envelope::ok_with("Station removed from Radio"),
            Err(e) => {
                warn!("Cannot remove favorite {}: {}", url, e);
                Envelope::failure("Failed to remove station from favorites")
            }
        }
    }

    /// All favorites
    pub async fn favorites(&self) -> Envelope {
        match self.favorites.list() {
            Ok(favorites) => Envelope::ok().with("favorites", favorites),
            Err(e) => {
                warn!("Cannot read favorites: {}", e);
                Envelope::failure("Failed to read favorites")
            }
        }
    }

    /// Public reference of a favorite's logo
    pub async fn station_logo(&self, url: &str) -> Envelope {
        let url = url.trim();
        if url.is_empty() {
            return Envelope::failure("No URL provided");
        }

        let favorite = match self.favorites.find(url) {
            Ok(favorite) => favorite,
            Err(e) => {
                warn!("Cannot read favorites: {}", e);
                return Envelope::failure("Failed to read favorites");
            }
        };

        match favorite {
            Some(f) if !f.logo.is_empty() && f.logo != LOCAL_LOGO => {
                let logo = if f.logo.starts_with("http://") || f.logo.starts_with("https://") {
                    f.logo
                } else {
                    format!("{}/{}", PERMANENT_LOGOS_PREFIX, f.logo)
                };
                Envelope::ok().with("logo", logo)
            }
            _ => Envelope::failure("No logo found for this station"),
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Delete cached responses and cached logos
    ///
    /// The ledger, favorites and custom APIs are untouched.
    pub async fn flush_cache(&self) -> Envelope {
        let mut deleted = self.cache.flush();
        if let Some(logos) = &self.logos {
            deleted += logos.clear();
        }
        info!("Cache flushed: {} files deleted", deleted);
        Envelope::ok_with(format!("Cache flushed ({deleted} files deleted)"))
    }

    pub async fn custom_apis(&self) -> Envelope {
        Envelope::ok().with("apis", self.custom_apis.list())
    }

    /// Register a custom API (`kind` defaults to `radio-browser`)
    pub async fn add_custom_api(&self, name: &str, url: &str, kind: Option<&str>) -> Envelope {
        let kind = kind.unwrap_or(DEFAULT_API_TYPE);
        match self.custom_apis.add(name, url, kind) {
            Ok((id, apis)) => Envelope::ok_with("Custom API added")
                .with("id", id)
                .with("apis", apis),
            Err(e) => registry_failure(e, "Failed to save custom API"),
        }
    }

    pub async fn remove_custom_api(&self, id: &str) -> Envelope {
        match self.custom_apis.remove(id) {
            Ok(apis) => Envelope::ok_with("Custom API removed").with("apis", apis),
            Err(e) => registry_failure(e, "Failed to remove custom API"),
        }
    }

    /// Run a named maintenance task, its output goes to `details`
    pub async fn run_maintenance_task(&self, task: &str) -> Envelope {
        match self.maintenance.run(task).await {
            Ok(output) => Envelope::ok_with(format!("{task} completed")).with("details", output),
            Err(e @ MaintenanceError::NotFound(_)) => Envelope::failure(e.to_string()),
            Err(MaintenanceError::InvalidName(_)) => Envelope::failure("Invalid task name"),
            Err(e) => Envelope::failure(e.to_string()),
        }
    }

    /// Liveness answer of the service
    pub async fn ping(&self) -> Envelope {
        Envelope::ok_with("Radio Browser API is working")
            .with("timestamp", Utc::now().timestamp())
            .with("version", env!("CARGO_PKG_VERSION"))
    }
}

fn player_failure(command: &str, error: PlayerError) -> Envelope {
    warn!("Player {} failed: {}", command, error);
    match error {
        PlayerError::Unavailable(_) => Envelope::failure(MSG_PLAYER_UNAVAILABLE),
        PlayerError::Command { .. } => Envelope::failure(format!("Player {command} failed")),
    }
}

fn registry_failure(error: Error, fallback: &str) -> Envelope {
    match error {
        Error::Rejected(message) => Envelope::failure(message),
        other => {
            warn!("Custom API registry error: {}", other);
            Envelope::failure(fallback)
        }
    }
}

/// Builder of a [`RadioBrowser`]
pub struct RadioBrowserBuilder {
    client: FailoverClient,
    cache: TtlCache,
    data_dir: PathBuf,
    ttls: CacheTtls,
    logos: Option<LogoCache>,
    permanent_logos: Option<PermanentLogos>,
    favorites: Option<Arc<dyn FavoritesStore>>,
    player: Option<Arc<dyn Player>>,
    maintenance: Option<Arc<dyn MaintenanceRunner>>,
}

impl RadioBrowserBuilder {
    pub fn ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Cache station favicons in this logo cache
    pub fn logos(mut self, logos: LogoCache) -> Self {
        self.logos = Some(logos);
        self
    }

    /// Produce permanent logos when adding favorites
    pub fn permanent_logos(mut self, importer: PermanentLogos) -> Self {
        self.permanent_logos = Some(importer);
        self
    }

    /// Favorites store (SQLite in the data directory if not set)
    pub fn favorites(mut self, store: Arc<dyn FavoritesStore>) -> Self {
        self.favorites = Some(store);
        self
    }

    /// Player collaborator ([`NoPlayer`] if not set)
    pub fn player(mut self, player: Arc<dyn Player>) -> Self {
        self.player = Some(player);
        self
    }

    /// Maintenance runner (scripts of `{data_dir}/scripts` if not set)
    pub fn maintenance(mut self, runner: Arc<dyn MaintenanceRunner>) -> Self {
        self.maintenance = Some(runner);
        self
    }

    pub fn build(self) -> Result<RadioBrowser> {
        std::fs::create_dir_all(&self.data_dir)?;

        let favorites = match self.favorites {
            Some(store) => store,
            None => Arc::new(SqliteFavorites::open(&self.data_dir.join("favorites.db"))?),
        };
        let maintenance = self
            .maintenance
            .unwrap_or_else(|| Arc::new(ScriptRunner::new(self.data_dir.join("scripts"))));

        Ok(RadioBrowser {
            client: self.client,
            cache: self.cache,
            ttls: self.ttls,
            logos: self.logos,
            permanent_logos: self.permanent_logos,
            ledger: RecentlyPlayed::new(self.data_dir.join("recently_played.json")),
            favorites,
            custom_apis: CustomApiRegistry::new(self.data_dir.join("custom_apis.json")),
            player: self.player.unwrap_or_else(|| Arc::new(NoPlayer)),
            maintenance,
        })
    }
}
