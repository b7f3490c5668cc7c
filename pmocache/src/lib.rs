//! # pmocache - Cache JSON à durée de vie pour PMORadio
//!
//! Cette crate fournit un cache clé → document JSON avec expiration (TTL).
//! Elle sert de base à toutes les couches qui interrogent des services
//! distants : la liste des miroirs, les recherches de stations, les listes
//! de pays et de genres.
//!
//! ## Vue d'ensemble
//!
//! ```text
//! pmocache
//!     ├── store.rs   - Trait CacheStore + FileStore (disque) + MemoryStore
//!     ├── ttl.rs     - TtlCache : lecture avec TTL, écriture horodatée
//!     └── key.rs     - Dérivation déterministe des clés
//! ```
//!
//! Le cache est consultatif : une lecture qui échoue est traitée comme une
//! absence, une écriture qui échoue est journalisée puis ignorée. Il n'est
//! jamais la source de vérité.
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmocache::{params_key, TtlCache};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cache = TtlCache::file("./cache")?;
//!
//! let key = params_key("search", [("name", "jazz"), ("limit", "30")]);
//! if cache.get(&key, Duration::from_secs(1800)).is_none() {
//!     cache.set(&key, json!([{"name": "Jazz FM"}]));
//! }
//! # Ok(())
//! # }
//! ```

pub mod key;
pub mod store;
pub mod ttl;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use key::{hash_key, params_key};
pub use store::{CacheEntry, CacheStore, FileStore, MemoryStore};
pub use ttl::TtlCache;

#[cfg(feature = "pmoconfig")]
pub use config_ext::JsonCacheConfigExt;
