//! Favorite stations store
//!
//! The store is a simple keyed collaborator: insert, delete by URL, list.
//! [`SqliteFavorites`] keeps them in a SQLite table.

use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// A favorite station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteStation {
    pub url: String,
    pub name: String,
    /// File name of the permanent logo, or `"local"`
    pub logo: String,
}

/// Keyed store of favorite stations
pub trait FavoritesStore: Send + Sync {
    /// Add a station
    fn add(&self, station: &FavoriteStation) -> Result<()>;

    /// Remove every station with this URL, returns how many were removed
    fn remove(&self, url: &str) -> Result<usize>;

    /// All stations, in insertion order
    fn list(&self) -> Result<Vec<FavoriteStation>>;

    /// The `limit` most recently added stations, newest first
    fn newest(&self, limit: usize) -> Result<Vec<FavoriteStation>>;

    /// Whether a station with this name is already stored
    fn contains_name(&self, name: &str) -> Result<bool>;

    /// First station with this URL
    fn find(&self, url: &str) -> Result<Option<FavoriteStation>>;
}

/// SQLite-backed favorites
#[derive(Debug)]
pub struct SqliteFavorites {
    conn: Mutex<Connection>,
}

impl SqliteFavorites {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::init(Connection::open(path)?)?;
        info!("Favorites database opened at {}", path.display());
        Ok(store)
    }

    /// Database living only as long as this value
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS favorites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                logo TEXT NOT NULL DEFAULT 'local',
                added_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_favorites_url ON favorites (url)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| crate::Error::Poisoned("Favorites database"))?;
        Ok(f(&conn)?)
    }

    fn query_stations(&self, sql: &str, limit: Option<usize>) -> Result<Vec<FavoriteStation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let map_row = |row: &rusqlite::Row<'_>| {
                Ok(FavoriteStation {
                    url: row.get::<_, String>(0)?.trim().to_string(),
                    name: row.get::<_, String>(1)?.trim().to_string(),
                    logo: row.get::<_, String>(2)?.trim().to_string(),
                })
            };
            let rows = match limit {
                Some(limit) => stmt.query_map(params![limit as i64], map_row)?,
                None => stmt.query_map([], map_row)?,
            };
            rows.collect()
        })
    }
}

impl FavoritesStore for SqliteFavorites {
    fn add(&self, station: &FavoriteStation) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO favorites (url, name, logo, added_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    station.url,
                    station.name,
                    station.logo,
                    Utc::now().to_rfc3339()
                ],
            )
        })?;
        debug!("Favorite added: {} ({})", station.name, station.url);
        Ok(())
    }

    fn remove(&self, url: &str) -> Result<usize> {
        let removed =
            self.with_conn(|conn| conn.execute("DELETE FROM favorites WHERE url = ?1", [url]))?;
        debug!("Favorite removed: {} ({} rows)", url, removed);
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<FavoriteStation>> {
        self.query_stations("SELECT url, name, logo FROM favorites ORDER BY id ASC", None)
    }

    fn newest(&self, limit: usize) -> Result<Vec<FavoriteStation>> {
        self.query_stations(
            "SELECT url, name, logo FROM favorites ORDER BY id DESC LIMIT ?1",
            Some(limit),
        )
    }

    fn contains_name(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM favorites WHERE name = ?1 LIMIT 1",
                [name],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
        })
    }

    fn find(&self, url: &str) -> Result<Option<FavoriteStation>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT url, name, logo FROM favorites WHERE url = ?1 ORDER BY id ASC LIMIT 1",
                [url],
                |row| {
                    Ok(FavoriteStation {
                        url: row.get(0)?,
                        name: row.get(1)?,
                        logo: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }
}
