//! Extension pour intégrer Radio Browser dans pmoconfig
//!
//! Ce module fournit le trait `RadioBrowserConfigExt` qui ajoute à
//! `pmoconfig::Config` les réglages de la source Radio Browser et une
//! fabrique du service complet.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoradiobrowser::{NoPlayer, RadioBrowserConfigExt};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let service = config.create_radiobrowser(Arc::new(NoPlayer))?;
//! let answer = service.top_stations(Some(10)).await;
//! println!("{}", answer.success);
//! # Ok(())
//! # }
//! ```

use crate::client::{
    FailoverClient, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
use crate::maintenance::ScriptRunner;
use crate::mirrors::{
    DEFAULT_DISCOVERY_URL, DEFAULT_FALLBACK_MIRRORS, DEFAULT_SERVERS_TTL_SECS,
};
use crate::player::Player;
use crate::service::{CacheTtls, RadioBrowser, DEFAULT_SEARCH_TTL_SECS, DEFAULT_STATIC_TTL_SECS};
use anyhow::Result;
use pmocache::JsonCacheConfigExt;
use pmoconfig::Config;
use pmocovers::LogoCacheConfigExt;
use serde_yaml::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SCRIPTS_DIR: &str = "scripts";

/// Trait d'extension pour gérer la configuration Radio Browser dans pmoconfig
///
/// Les durées sont exprimées en secondes ; une valeur absente ou invalide
/// prend sa valeur par défaut.
pub trait RadioBrowserConfigExt {
    /// Vérifie si la source est activée (default: true)
    fn get_radiobrowser_enabled(&self) -> Result<bool>;

    /// Active ou désactive la source
    fn set_radiobrowser_enabled(&self, enabled: bool) -> Result<()>;

    /// URL de l'agrégateur listant les miroirs
    fn get_radiobrowser_discovery_url(&self) -> String;

    /// Miroirs de secours, utilisés quand la découverte ne donne rien
    fn get_radiobrowser_fallback_mirrors(&self) -> Vec<String>;

    fn get_radiobrowser_user_agent(&self) -> String;

    /// Timeout d'une tentative sur un miroir (default: 10 s)
    fn get_radiobrowser_request_timeout(&self) -> Duration;

    /// Timeout de connexion (default: 5 s)
    fn get_radiobrowser_connect_timeout(&self) -> Duration;

    /// Durée de vie de la liste des miroirs (default: 1 h)
    fn get_radiobrowser_servers_ttl(&self) -> Duration;

    /// Durées de vie des recherches (30 min) et des listes statiques (24 h)
    fn get_radiobrowser_cache_ttls(&self) -> CacheTtls;

    /// Répertoire des données persistantes (historique, favoris, APIs)
    fn get_radiobrowser_data_dir(&self) -> Result<String>;

    /// Répertoire des scripts de maintenance
    fn get_radiobrowser_scripts_dir(&self) -> Result<String>;

    /// Crée le service complet à partir de la configuration
    fn create_radiobrowser(&self, player: Arc<dyn Player>) -> Result<RadioBrowser>;
}

impl RadioBrowserConfigExt for Config {
    fn get_radiobrowser_enabled(&self) -> Result<bool> {
        match self.get_value(&["sources", "radiobrowser", "enabled"]) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => {
                self.set_radiobrowser_enabled(true)?;
                Ok(true)
            }
        }
    }

    fn set_radiobrowser_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(&["sources", "radiobrowser", "enabled"], Value::Bool(enabled))
    }

    fn get_radiobrowser_discovery_url(&self) -> String {
        self.get_string_or(&["sources", "radiobrowser", "discovery_url"], DEFAULT_DISCOVERY_URL)
    }

    fn get_radiobrowser_fallback_mirrors(&self) -> Vec<String> {
        match self.get_string_list(&["sources", "radiobrowser", "fallback_mirrors"]) {
            Ok(mirrors) if !mirrors.is_empty() => mirrors,
            _ => DEFAULT_FALLBACK_MIRRORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn get_radiobrowser_user_agent(&self) -> String {
        self.get_string_or(&["sources", "radiobrowser", "user_agent"], DEFAULT_USER_AGENT)
    }

    fn get_radiobrowser_request_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["sources", "radiobrowser", "request_timeout_secs"],
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ))
    }

    fn get_radiobrowser_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["sources", "radiobrowser", "connect_timeout_secs"],
            DEFAULT_CONNECT_TIMEOUT_SECS,
        ))
    }

    fn get_radiobrowser_servers_ttl(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["sources", "radiobrowser", "servers_ttl_secs"],
            DEFAULT_SERVERS_TTL_SECS,
        ))
    }

    fn get_radiobrowser_cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            search: Duration::from_secs(self.get_u64_or(
                &["sources", "radiobrowser", "search_ttl_secs"],
                DEFAULT_SEARCH_TTL_SECS,
            )),
            static_data: Duration::from_secs(self.get_u64_or(
                &["sources", "radiobrowser", "static_ttl_secs"],
                DEFAULT_STATIC_TTL_SECS,
            )),
        }
    }

    fn get_radiobrowser_data_dir(&self) -> Result<String> {
        self.get_managed_dir(&["sources", "radiobrowser", "data_dir"], DEFAULT_DATA_DIR)
    }

    fn get_radiobrowser_scripts_dir(&self) -> Result<String> {
        self.get_managed_dir(&["sources", "radiobrowser", "scripts_dir"], DEFAULT_SCRIPTS_DIR)
    }

    fn create_radiobrowser(&self, player: Arc<dyn Player>) -> Result<RadioBrowser> {
        let cache = self.create_json_cache()?;

        let client = FailoverClient::builder()
            .cache(cache.clone())
            .discovery_url(self.get_radiobrowser_discovery_url())
            .fallback_mirrors(self.get_radiobrowser_fallback_mirrors())
            .servers_ttl(self.get_radiobrowser_servers_ttl())
            .timeout(self.get_radiobrowser_request_timeout())
            .connect_timeout(self.get_radiobrowser_connect_timeout())
            .user_agent(self.get_radiobrowser_user_agent())
            .build()?;

        let data_dir = self.get_radiobrowser_data_dir()?;
        let scripts_dir = self.get_radiobrowser_scripts_dir()?;

        let service = RadioBrowser::builder(client, cache, &data_dir)
            .ttls(self.get_radiobrowser_cache_ttls())
            .logos(self.create_logo_cache()?)
            .permanent_logos(self.create_permanent_logos()?)
            .player(player)
            .maintenance(Arc::new(ScriptRunner::new(scripts_dir)))
            .build()?;

        info!("Radio Browser service ready (data in {})", data_dir);
        Ok(service)
    }
}
