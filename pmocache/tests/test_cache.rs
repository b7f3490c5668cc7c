use chrono::Utc;
use pmocache::{params_key, CacheEntry, CacheStore, FileStore, TtlCache};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(1800);

fn create_file_cache() -> (TempDir, TtlCache) {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache = TtlCache::file(temp_dir.path()).unwrap();
    (temp_dir, cache)
}

fn backdate(cache: &TtlCache, key: &str, payload: Value, secs: i64) {
    let entry = CacheEntry::stored_at(key, payload, Utc::now() - chrono::Duration::seconds(secs));
    cache.store().store(&entry).unwrap();
}

#[test]
fn test_set_then_get_returns_same_value() {
    let (_dir, cache) = create_file_cache();

    let values = [
        json!(null),
        json!(42),
        json!("fip"),
        json!([{"name": "Test", "tags": "jazz,rock"}]),
        json!({"nested": {"list": [1, 2, 3], "unicode": "Fréquence Mutine"}}),
    ];

    for (i, value) in values.iter().enumerate() {
        let key = format!("k{}", i);
        cache.set(&key, value.clone());
        assert_eq!(cache.get(&key, TTL).as_ref(), Some(value));
    }
}

#[test]
fn test_memory_cache_behaves_like_file_cache() {
    let cache = TtlCache::in_memory();
    cache.set("servers", json!(["a", "b"]));
    assert_eq!(cache.get("servers", TTL), Some(json!(["a", "b"])));
    assert_eq!(cache.get("missing", TTL), None);
}

#[test]
fn test_expired_entry_is_absent() {
    let (_dir, cache) = create_file_cache();
    backdate(&cache, "countries", json!(["FR"]), 120);

    assert_eq!(cache.get("countries", Duration::from_secs(60)), None);
    assert_eq!(
        cache.get("countries", Duration::from_secs(600)),
        Some(json!(["FR"]))
    );
}

#[test]
fn test_zero_ttl_never_hits() {
    let (_dir, cache) = create_file_cache();
    cache.set("k", json!(1));
    assert_eq!(cache.get("k", Duration::ZERO), None);
}

#[test]
fn test_stale_read_ignores_expiry() {
    let (_dir, cache) = create_file_cache();
    backdate(&cache, "top_click_30", json!([{"name": "Old"}]), 7 * 86400);

    assert_eq!(cache.get("top_click_30", TTL), None);
    assert_eq!(cache.get_stale("top_click_30"), Some(json!([{"name": "Old"}])));
}

#[test]
fn test_overwrite_refreshes_timestamp() {
    let (_dir, cache) = create_file_cache();
    backdate(&cache, "genres", json!(["old"]), 3600);
    cache.set("genres", json!(["new"]));

    assert_eq!(cache.get("genres", Duration::from_secs(60)), Some(json!(["new"])));
}

#[test]
fn test_corrupt_file_is_treated_as_absent() {
    let (dir, cache) = create_file_cache();
    let store = FileStore::new(dir.path()).unwrap();

    std::fs::write(store.entry_path("broken"), b"{not json").unwrap();

    assert_eq!(cache.get("broken", TTL), None);
    assert_eq!(cache.get_stale("broken"), None);
}

#[test]
fn test_failing_store_does_not_fail_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();

    let store = FileStore::new(dir.path()).unwrap();
    let broken = TtlCache::new(Arc::new(BlockedStore(store, blocker)));
    broken.set("k", json!(1));
    assert_eq!(broken.get("k", TTL), None);
    assert_eq!(broken.flush(), 0);
}

/// Stockage dont toutes les écritures échouent (création sous un fichier)
struct BlockedStore(FileStore, std::path::PathBuf);

impl CacheStore for BlockedStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<CacheEntry>> {
        self.0.load(key)
    }

    fn store(&self, _entry: &CacheEntry) -> anyhow::Result<()> {
        std::fs::create_dir(self.1.join("sub"))?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<usize> {
        Err(anyhow::anyhow!("read-only"))
    }
}

#[test]
fn test_flush_removes_every_entry() {
    let (dir, cache) = create_file_cache();
    cache.set("a", json!(1));
    cache.set("b", json!(2));
    cache.set(&params_key("search", [("name", "x")]), json!([]));
    // Les fichiers étrangers au cache ne sont pas comptés
    std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

    assert_eq!(cache.flush(), 3);
    assert_eq!(cache.get("a", TTL), None);
    assert!(dir.path().join("notes.txt").exists());
}

#[test]
fn test_typed_helpers() {
    let cache = TtlCache::in_memory();
    cache.set_as("servers", &vec!["de1.example".to_string()]);

    let servers: Option<Vec<String>> = cache.get_as("servers", TTL);
    assert_eq!(servers, Some(vec!["de1.example".to_string()]));

    // Forme inattendue : absent
    cache.set("servers", json!({"oops": true}));
    let servers: Option<Vec<String>> = cache.get_as("servers", TTL);
    assert_eq!(servers, None);
}

#[test]
fn test_identical_requests_share_a_cache_entry() {
    let cache = TtlCache::in_memory();
    let first = params_key("search", [("name", "jazz"), ("limit", "30")]);
    cache.set(&first, json!([{"name": "Jazz FM"}]));

    let second = params_key("search", [("limit", "30"), ("name", "jazz"), ("tag", "")]);
    assert_eq!(cache.get(&second, TTL), Some(json!([{"name": "Jazz FM"}])));
}
