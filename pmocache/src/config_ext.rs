//! Extension pour intégrer le cache JSON dans pmoconfig
//!
//! Ce module fournit le trait `JsonCacheConfigExt` qui ajoute à
//! `pmoconfig::Config` la gestion du répertoire du cache JSON.

use anyhow::Result;
use pmoconfig::Config;

use crate::TtlCache;

const DEFAULT_JSON_CACHE_DIR: &str = "cache_radiobrowser";

/// Trait d'extension pour gérer le cache JSON dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmocache::JsonCacheConfigExt;
///
/// let config = get_config();
/// let cache = config.create_json_cache()?;
/// ```
pub trait JsonCacheConfigExt {
    /// Récupère le répertoire du cache JSON (default: "cache_radiobrowser")
    fn get_json_cache_dir(&self) -> Result<String>;

    /// Définit le répertoire du cache JSON (absolu ou relatif au config_dir)
    fn set_json_cache_dir(&self, directory: String) -> Result<()>;

    /// Crée un cache JSON sur disque dans le répertoire configuré
    fn create_json_cache(&self) -> Result<TtlCache>;
}

impl JsonCacheConfigExt for Config {
    fn get_json_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["host", "json_cache", "directory"], DEFAULT_JSON_CACHE_DIR)
    }

    fn set_json_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["host", "json_cache", "directory"], directory)
    }

    fn create_json_cache(&self) -> Result<TtlCache> {
        let dir = self.get_json_cache_dir()?;
        TtlCache::file(dir)
    }
}
