//! Stockage des entrées de cache
//!
//! Le trait [`CacheStore`] sépare la politique d'expiration (dans
//! [`crate::TtlCache`]) du support physique. Deux implémentations :
//!
//! - [`FileStore`] : un fichier JSON par clé, partagé entre processus.
//! - [`MemoryStore`] : une table en mémoire, pour les tests.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::key::hash_key;

/// Entrée du cache : un document JSON horodaté
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Crée une entrée horodatée à l'instant présent
    pub fn new(key: impl Into<String>, payload: Value) -> Self {
        Self::stored_at(key, payload, Utc::now())
    }

    /// Crée une entrée avec un horodatage explicite
    pub fn stored_at(key: impl Into<String>, payload: Value, stored_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            stored_at,
        }
    }

    /// Âge de l'entrée à l'instant `now`
    ///
    /// Une date de stockage dans le futur (horloge décalée) donne un âge nul.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// L'entrée est fraîche si son âge est strictement inférieur au TTL
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

/// Support de stockage des entrées de cache
///
/// Les implémentations remplacent une entrée en entier (jamais de mise à jour
/// partielle) et n'appliquent aucune politique d'expiration.
pub trait CacheStore: Send + Sync {
    /// Charge l'entrée associée à `key`, `None` si absente
    fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Écrit (ou écrase) une entrée
    fn store(&self, entry: &CacheEntry) -> Result<()>;

    /// Supprime toutes les entrées et retourne leur nombre
    fn clear(&self) -> Result<usize>;
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stockage sur disque : un fichier `{sha256(key)}.json` par entrée
///
/// Les écritures passent par un fichier temporaire renommé, de sorte qu'un
/// lecteur concurrent voit l'ancienne ou la nouvelle version, jamais un
/// document tronqué. Deux écrivains concurrents : le dernier gagne.
#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    /// Crée le stockage, en créant le répertoire si nécessaire
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
            info!("Created cache directory: {}", cache_dir.display());
        }

        Ok(Self { cache_dir })
    }

    /// Répertoire du cache
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Chemin du fichier d'une clé
    ///
    /// Format: `{cache_dir}/{sha256(key)}.json`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", hash_key(key)))
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("json.{}.{}.tmp", std::process::id(), n))
    }
}

impl CacheStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let entry: CacheEntry = serde_json::from_slice(&data)?;

        if entry.key != key {
            return Err(anyhow!(
                "Cache file {} holds key {:?}, expected {:?}",
                path.display(),
                entry.key,
                key
            ));
        }

        Ok(Some(entry))
    }

    fn store(&self, entry: &CacheEntry) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }

        let path = self.entry_path(&entry.key);
        let tmp = self.temp_path(&path);
        let json = serde_json::to_vec(entry)?;

        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("Saved cache entry {} to {}", entry.key, path.display());
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let mut deleted = 0;
        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let path = dir_entry?.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if path.is_file() && is_json && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Stockage en mémoire, non partagé entre processus
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_freshness_boundary() {
        let now = Utc::now();
        let entry = CacheEntry::stored_at("k", json!(1), now - chrono::Duration::seconds(10));

        assert!(entry.is_fresh(Duration::from_secs(11), now));
        // age == ttl : expirée
        assert!(!entry.is_fresh(Duration::from_secs(10), now));
        assert!(!entry.is_fresh(Duration::from_secs(5), now));
    }

    #[test]
    fn test_entry_from_the_future_has_zero_age() {
        let now = Utc::now();
        let entry = CacheEntry::stored_at("k", json!(1), now + chrono::Duration::seconds(60));
        assert_eq!(entry.age(now), Duration::ZERO);
    }

    #[test]
    fn test_file_store_roundtrip_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        let entry = CacheEntry::new("countries", json!([{"name": "France"}]));
        store.store(&entry).unwrap();

        let path = store.entry_path("countries");
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap().len(), 64 + ".json".len());
        assert_eq!(store.load("countries").unwrap(), Some(entry));
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        for i in 0..5 {
            store.store(&CacheEntry::new("k", json!(i))).unwrap();
        }

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.load("k").unwrap().unwrap().payload, json!(4));
    }

    #[test]
    fn test_memory_store_clear() {
        let store = MemoryStore::new();
        store.store(&CacheEntry::new("a", json!(1))).unwrap();
        store.store(&CacheEntry::new("b", json!(2))).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty());
    }
}
