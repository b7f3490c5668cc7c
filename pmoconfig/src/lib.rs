//! # PMORadio configuration
//!
//! Configuration YAML de PMORadio :
//!
//! - un fichier par défaut embarqué dans le binaire, fusionné avec
//!   `<config_dir>/config.yaml` ;
//! - des surcharges par variables d'environnement
//!   `PMORADIO_CONFIG__HOST__HTTP_PORT=9000` ;
//! - des getters typés avec valeurs par défaut, et des répertoires gérés
//!   (relatifs au répertoire de configuration, créés à la demande).
//!
//! Les crates qui ont leurs propres réglages (caches, source Radio Browser)
//! les ajoutent par des traits d'extension implémentés sur [`Config`].
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! let cache_dir = config.get_managed_dir(&["host", "json_cache", "directory"], "cache")?;
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod tree;

use anyhow::{anyhow, bail, Result};
use lazy_static::lazy_static;
use serde_yaml::{Number, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

const EMBEDDED_DEFAULTS: &str = include_str!("pmoradio.yaml");
const CONFIG_FILE_NAME: &str = "config.yaml";

const ENV_CONFIG_DIR: &str = "PMORADIO_CONFIG";
const ENV_OVERRIDE_PREFIX: &str = "PMORADIO_CONFIG__";
const DEFAULT_DIR_NAME: &str = ".pmoradio";

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(
        Config::load_config("").unwrap_or_else(|e| panic!("Cannot load PMORadio configuration: {e:#}"))
    );
}

/// Configuration globale, chargée au premier accès
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Génère un couple getter/setter booléen avec valeur par défaut
macro_rules! bool_setting {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            Ok(match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            })
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration de PMORadio, persistée dans `config.yaml`
///
/// Chaque modification est réécrite immédiatement sur disque.
#[derive(Debug)]
pub struct Config {
    dir: PathBuf,
    file: PathBuf,
    root: RwLock<Value>,
}

impl Config {
    /// Choisit le répertoire de configuration
    ///
    /// Dans l'ordre : `directory` s'il est non vide, `$PMORADIO_CONFIG`,
    /// `./.pmoradio` s'il existe, `~/.pmoradio` s'il existe, sinon
    /// `./.pmoradio`.
    fn locate(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }
        if let Ok(from_env) = std::env::var(ENV_CONFIG_DIR) {
            debug!("Config directory from {}: {}", ENV_CONFIG_DIR, from_env);
            return PathBuf::from(from_env);
        }

        let local = PathBuf::from(DEFAULT_DIR_NAME);
        if local.is_dir() {
            return local;
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_DIR_NAME))
            .filter(|p| p.is_dir())
            .unwrap_or(local)
    }

    /// Crée le répertoire au besoin et vérifie qu'il est inscriptible
    fn prepare_dir(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        if !dir.is_dir() {
            bail!("Config path {} is not a directory", dir.display());
        }

        let marker = dir.join(".write_test");
        fs::write(&marker, b"ok")
            .and_then(|_| fs::remove_file(&marker))
            .map_err(|e| anyhow!("Config directory {} is not writable: {}", dir.display(), e))
    }

    /// Répertoire de configuration retenu (créé et vérifié)
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::locate(directory);
        Self::prepare_dir(&dir)?;
        Ok(dir.to_string_lossy().into_owned())
    }

    /// Charge la configuration depuis `directory` (vide : recherche par défaut)
    ///
    /// Les valeurs embarquées sont complétées par `config.yaml` s'il existe,
    /// puis par les variables d'environnement ; le résultat est réécrit.
    pub fn load_config(directory: &str) -> Result<Self> {
        let dir = PathBuf::from(Self::config_dir(directory)?);
        let file = dir.join(CONFIG_FILE_NAME);
        info!("Using config directory {}", dir.display());

        let mut root = tree::lowercase_keys(serde_yaml::from_str(EMBEDDED_DEFAULTS)?);
        match fs::read_to_string(&file) {
            Ok(text) => {
                let user: Value = serde_yaml::from_str(&text)?;
                tree::merge(&mut root, tree::lowercase_keys(user));
                info!("Loaded {}", file.display());
            }
            Err(_) => info!("No {}, using embedded defaults", file.display()),
        }

        tree::apply_overrides(&mut root, ENV_OVERRIDE_PREFIX, std::env::vars());

        let config = Self {
            dir,
            file,
            root: RwLock::new(root),
        };
        config.save()?;
        Ok(config)
    }

    /// Répertoire contenant `config.yaml`
    pub fn dir(&self) -> &str {
        self.dir.to_str().unwrap_or_default()
    }

    /// Réécrit `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = {
            let root = self
                .root
                .read()
                .map_err(|_| anyhow!("Configuration lock poisoned"))?;
            serde_yaml::to_string(&*root)?
        };
        fs::write(&self.file, yaml)?;
        Ok(())
    }

    /// Écrit une valeur (ex. `&["host", "http_port"]`) et sauvegarde
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut root = self
                .root
                .write()
                .map_err(|_| anyhow!("Configuration lock poisoned"))?;
            tree::assign(&mut root, path, value)?;
        }
        self.save()
    }

    /// Lit une valeur ; erreur si le chemin n'existe pas
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let root = self
            .root
            .read()
            .map_err(|_| anyhow!("Configuration lock poisoned"))?;
        tree::lookup(&root, path).cloned()
    }

    /// Lit une liste de chaînes (les éléments non textuels sont ignorés)
    pub fn get_string_list(&self, path: &[&str]) -> Result<Vec<String>> {
        let Value::Sequence(items) = self.get_value(path)? else {
            bail!("Path {} is not a list", path.join("."));
        };
        Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect())
    }

    /// Lit un entier positif, `default` si absent ou invalide
    pub fn get_u64_or(&self, path: &[&str], default: u64) -> u64 {
        let value = match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64(),
            Ok(Value::String(s)) => s.trim().parse().ok(),
            _ => return default,
        };
        value.unwrap_or_else(|| {
            warn!("Invalid value at {}, using {}", path.join("."), default);
            default
        })
    }

    pub fn set_u64(&self, path: &[&str], value: u64) -> Result<()> {
        self.set_value(path, Value::Number(Number::from(value)))
    }

    /// Lit une chaîne non vide, `default` sinon
    pub fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// Répertoire géré par la configuration
    ///
    /// Un chemin relatif est résolu par rapport au répertoire de
    /// configuration. Le répertoire est créé s'il n'existe pas ; la valeur
    /// par défaut est persistée si la clé est absente.
    ///
    /// ```no_run
    /// use pmoconfig::get_config;
    ///
    /// let dir = get_config().get_managed_dir(&["host", "json_cache", "directory"], "cache_radiobrowser")?;
    /// println!("JSON cache: {}", dir);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let configured = match self.get_value(path) {
            Ok(Value::String(s)) => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };

        let resolved = if Path::new(&configured).is_absolute() {
            PathBuf::from(&configured)
        } else {
            self.dir.join(&configured)
        };
        if !resolved.exists() {
            fs::create_dir_all(&resolved)?;
            info!("Created directory {}", resolved.display());
        }
        Ok(resolved.to_string_lossy().into_owned())
    }

    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    /// Port HTTP du serveur (8080 si absent ou invalide)
    pub fn get_http_port(&self) -> u16 {
        let port = self.get_u64_or(&["host", "http_port"], u64::from(DEFAULT_HTTP_PORT));
        u16::try_from(port).unwrap_or_else(|_| {
            warn!("HTTP port {} out of range, using {}", port, DEFAULT_HTTP_PORT);
            DEFAULT_HTTP_PORT
        })
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_u64(&["host", "http_port"], u64::from(port))
    }

    bool_setting!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Niveau de log minimum (`INFO` par défaut)
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self.get_string_or(&["host", "logger", "min_level"], DEFAULT_LOG_MIN_LEVEL))
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}
