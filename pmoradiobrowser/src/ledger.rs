//! Recently played stations
//!
//! A short most-recent-first list persisted as a JSON file. Replaying a
//! station moves it back to the front instead of duplicating it.
//!
//! The read-modify-write of [`RecentlyPlayed::record`] runs under an
//! exclusive lock on a sidecar `.lock` file, so concurrent writers from
//! other processes cannot drop each other's entries. The list itself is
//! replaced through a temporary file and a rename.

use crate::error::Result;
use crate::models::LOCAL_LOGO;
use chrono::Utc;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Number of stations kept
pub const DEFAULT_CAPACITY: usize = 6;

fn local_logo() -> String {
    LOCAL_LOGO.to_string()
}

/// One played station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub url: String,
    pub name: String,
    #[serde(default = "local_logo")]
    pub logo: String,
    /// Unix timestamp of the last play
    #[serde(default)]
    pub played_at: i64,
}

impl RecentEntry {
    /// Entry played now
    pub fn new(url: impl Into<String>, name: impl Into<String>, logo: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
            name: name.into(),
            logo: logo.into(),
            played_at: Utc::now().timestamp(),
        }
    }
}

/// File-backed recently played list
#[derive(Debug, Clone)]
pub struct RecentlyPlayed {
    path: PathBuf,
    capacity: usize,
}

impl RecentlyPlayed {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn with_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most-recent-first list, empty on first run or unreadable file
    pub async fn list(&self) -> Vec<RecentEntry> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_entries(&path))
            .await
            .unwrap_or_default()
    }

    /// Put `entry` in front, dropping any older entry with the same URL
    ///
    /// The list is truncated to the capacity and written back. Returns the
    /// new list.
    pub async fn record(&self, entry: RecentEntry) -> Result<Vec<RecentEntry>> {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || ledger.record_blocking(entry))
            .await?
    }

    fn record_blocking(&self, entry: RecentEntry) -> Result<Vec<RecentEntry>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))?;
        lock.lock_exclusive()?;

        let mut entries = read_entries(&self.path);
        entries.retain(|e| e.url != entry.url);
        entries.insert(0, entry);
        entries.truncate(self.capacity);

        write_entries(&self.path, &entries)?;

        // Unlock happens when the lock file is dropped
        drop(lock);

        if let Some(first) = entries.first() {
            debug!(
                "Recently played updated: {} now first, total: {}",
                first.name,
                entries.len()
            );
        }
        Ok(entries)
    }

    /// Forget every entry
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_entries(path: &Path) -> Vec<RecentEntry> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_slice(&data) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring unreadable ledger {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn write_entries(path: &Path, entries: &[RecentEntry]) -> Result<()> {
    let json = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("tmp");

    let mut file = File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> RecentEntry {
        RecentEntry::new(url, format!("Station {url}"), LOCAL_LOGO)
    }

    #[tokio::test]
    async fn test_first_run_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RecentlyPlayed::new(dir.path().join("recently_played.json"));
        assert!(ledger.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_replay_moves_to_front_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RecentlyPlayed::new(dir.path().join("recently_played.json"));

        for url in ["A", "B", "A", "C", "D", "E", "F"] {
            ledger.record(entry(url)).await.unwrap();
        }

        let urls: Vec<String> = ledger.list().await.into_iter().map(|e| e.url).collect();
        assert_eq!(urls, ["F", "E", "D", "C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_oldest_falls_off() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RecentlyPlayed::with_capacity(dir.path().join("r.json"), 3);

        for url in ["A", "B", "C", "D"] {
            ledger.record(entry(url)).await.unwrap();
        }

        let urls: Vec<String> = ledger.list().await.into_iter().map(|e| e.url).collect();
        assert_eq!(urls, ["D", "C", "B"]);
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recently_played.json");

        RecentlyPlayed::new(&path).record(entry("A")).await.unwrap();
        let reopened = RecentlyPlayed::new(&path).list().await;

        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened[0].name, "Station A");
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recently_played.json");
        std::fs::write(&path, b"[{broken").unwrap();

        let ledger = RecentlyPlayed::new(&path);
        assert!(ledger.list().await.is_empty());

        ledger.record(entry("A")).await.unwrap();
        assert_eq!(ledger.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RecentlyPlayed::new(dir.path().join("recently_played.json"));

        ledger.clear().await.unwrap();
        ledger.record(entry("A")).await.unwrap();
        ledger.clear().await.unwrap();
        assert!(ledger.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_records_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RecentlyPlayed::new(dir.path().join("recently_played.json"));

        let tasks: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|url| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.record(entry(url)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.list().await.len(), 4);
    }
}
