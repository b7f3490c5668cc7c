//! Extension pour intégrer le cache de logos dans pmoconfig
//!
//! Ce module fournit le trait `LogoCacheConfigExt` qui ajoute à
//! `pmoconfig::Config` les réglages du cache de logos et des logos permanents.

use anyhow::Result;
use pmoconfig::Config;
use std::time::Duration;

use crate::{LogoCache, LogoCacheSettings, PermanentLogos};

const DEFAULT_LOGO_CACHE_DIR: &str = "cache_radiobrowser/images";
const DEFAULT_PERMANENT_LOGOS_DIR: &str = "radio-logos";
const DEFAULT_USER_AGENT: &str = "pmoradio-radio-browser/1.0";
const PERMANENT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait d'extension pour gérer le cache de logos dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmocovers::LogoCacheConfigExt;
///
/// let config = get_config();
/// let logos = config.create_logo_cache()?;
/// let local = logos.fetch_and_cache("https://example.com/logo.png").await;
/// ```
pub trait LogoCacheConfigExt {
    /// Récupère le répertoire du cache de logos (default: "cache_radiobrowser/images")
    fn get_logo_cache_dir(&self) -> Result<String>;

    /// Définit le répertoire du cache de logos
    fn set_logo_cache_dir(&self, directory: String) -> Result<()>;

    /// Récupère le répertoire des logos permanents (default: "radio-logos")
    fn get_permanent_logos_dir(&self) -> Result<String>;

    /// Lit les réglages du cache (plafonds, TTL)
    ///
    /// Les valeurs absentes ou invalides prennent leur valeur par défaut.
    fn get_logo_cache_settings(&self) -> LogoCacheSettings;

    /// Crée le cache de logos configuré
    fn create_logo_cache(&self) -> Result<LogoCache>;

    /// Crée l'importeur de logos permanents configuré
    fn create_permanent_logos(&self) -> Result<PermanentLogos>;
}

impl LogoCacheConfigExt for Config {
    fn get_logo_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["host", "logo_cache", "directory"], DEFAULT_LOGO_CACHE_DIR)
    }

    fn set_logo_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["host", "logo_cache", "directory"], directory)
    }

    fn get_permanent_logos_dir(&self) -> Result<String> {
        self.get_managed_dir(
            &["host", "logo_cache", "permanent_dir"],
            DEFAULT_PERMANENT_LOGOS_DIR,
        )
    }

    fn get_logo_cache_settings(&self) -> LogoCacheSettings {
        let defaults = LogoCacheSettings::default();
        LogoCacheSettings {
            max_total_bytes: self.get_u64_or(
                &["host", "logo_cache", "max_bytes"],
                defaults.max_total_bytes,
            ),
            max_item_bytes: self.get_u64_or(
                &["host", "logo_cache", "max_item_bytes"],
                defaults.max_item_bytes,
            ),
            ttl: Duration::from_secs(
                self.get_u64_or(&["host", "logo_cache", "ttl_secs"], defaults.ttl.as_secs()),
            ),
            user_agent: self.get_string_or(
                &["sources", "radiobrowser", "user_agent"],
                DEFAULT_USER_AGENT,
            ),
            ..defaults
        }
    }

    fn create_logo_cache(&self) -> Result<LogoCache> {
        let dir = self.get_logo_cache_dir()?;
        LogoCache::new(dir, self.get_logo_cache_settings())
    }

    fn create_permanent_logos(&self) -> Result<PermanentLogos> {
        let dir = self.get_permanent_logos_dir()?;
        let user_agent =
            self.get_string_or(&["sources", "radiobrowser", "user_agent"], DEFAULT_USER_AGENT);
        PermanentLogos::new(dir, &user_agent, PERMANENT_FETCH_TIMEOUT)
    }
}
