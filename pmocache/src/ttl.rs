//! Cache avec expiration au-dessus d'un [`CacheStore`]

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::{CacheEntry, CacheStore, FileStore, MemoryStore};

/// Cache clé → JSON avec TTL fourni à la lecture
///
/// Le TTL n'est pas stocké avec l'entrée : chaque appelant décide de la
/// fraîcheur qu'il exige (30 min pour une recherche, 24 h pour la liste des
/// pays...). Aucune erreur ne remonte à l'appelant.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn CacheStore>,
}

impl TtlCache {
    /// Crée un cache au-dessus d'un stockage arbitraire
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Crée un cache sur disque dans `dir`
    pub fn file<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(FileStore::new(dir)?)))
    }

    /// Crée un cache en mémoire
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Accès au stockage sous-jacent
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    fn load(&self, key: &str) -> Option<CacheEntry> {
        match self.store.load(key) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Lit une valeur si son âge est strictement inférieur à `ttl`
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Value> {
        let entry = self.load(key)?;
        if entry.is_fresh(ttl, Utc::now()) {
            Some(entry.payload)
        } else {
            debug!("Cache entry {} expired", key);
            None
        }
    }

    /// Lit une valeur en ignorant son âge
    ///
    /// Réservé aux replis en cas d'indisponibilité totale de l'amont.
    pub fn get_stale(&self, key: &str) -> Option<Value> {
        self.load(key).map(|entry| entry.payload)
    }

    /// Écrit une valeur horodatée maintenant, en écrasant l'ancienne
    ///
    /// Une erreur d'écriture est journalisée et ignorée.
    pub fn set(&self, key: &str, value: Value) {
        let entry = CacheEntry::new(key, value);
        if let Err(e) = self.store.store(&entry) {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    /// Variante typée de [`TtlCache::get`]
    ///
    /// Une valeur qui ne se désérialise pas dans `T` est traitée comme absente.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let value = self.get(key, ttl)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Cache entry {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Variante typée de [`TtlCache::set`]
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v),
            Err(e) => warn!("Cannot serialize cache entry {}: {}", key, e),
        }
    }

    /// Vide le cache et retourne le nombre d'entrées supprimées
    pub fn flush(&self) -> usize {
        match self.store.clear() {
            Ok(n) => n,
            Err(e) => {
                warn!("Cache flush failed: {}", e);
                0
            }
        }
    }
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").finish_non_exhaustive()
    }
}
