//! Registry of user-declared directory APIs
//!
//! Stored as a JSON object keyed by id in the data directory, so that it
//! survives cache flushes. Ids are derived from the name and a hash of the
//! URL; URLs are unique across registrations.

use crate::error::{Error, Result};
use chrono::Local;
use indexmap::IndexMap;
use pmocache::hash_key;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// Type given to a registration that does not name one
pub const DEFAULT_API_TYPE: &str = "radio-browser";

/// A registered API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomApi {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Local time of registration, `YYYY-MM-DD HH:MM:SS`
    pub added: String,
}

/// Registrations by id, in insertion order
pub type CustomApis = IndexMap<String, CustomApi>;

/// Id of a registration: `custom_{name}_{hash6}`
///
/// The name is lowercased and every character outside `[a-z0-9]` replaced
/// by `_`; `hash6` is the first six hex digits of the URL hash.
pub fn custom_api_id(name: &str, url: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .collect();
    format!("custom_{}_{}", slug, &hash_key(url)[..6])
}

fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.has_host() && !parsed.scheme().is_empty(),
        Err(_) => false,
    }
}

/// File-backed registry
#[derive(Debug, Clone)]
pub struct CustomApiRegistry {
    path: PathBuf,
}

impl CustomApiRegistry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current registrations, empty if none or unreadable
    pub fn list(&self) -> CustomApis {
        let Ok(data) = fs::read(&self.path) else {
            return CustomApis::new();
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!("Ignoring unreadable registry {}: {}", self.path.display(), e);
            CustomApis::new()
        })
    }

    /// Register an API, returns its id and the updated registrations
    ///
    /// Inputs are trimmed. Invalid input yields [`Error::Rejected`] with a
    /// message meant for the user.
    pub fn add(&self, name: &str, url: &str, kind: &str) -> Result<(String, CustomApis)> {
        let (name, url, kind) = (name.trim(), url.trim(), kind.trim());

        if name.is_empty() {
            return Err(Error::rejected("Name is required"));
        }
        if url.is_empty() {
            return Err(Error::rejected("URL is required"));
        }
        if !is_valid_url(url) {
            return Err(Error::rejected("Invalid URL format"));
        }

        let mut apis = self.list();
        if apis.values().any(|api| api.url == url) {
            return Err(Error::rejected("API with this URL already exists"));
        }

        let id = custom_api_id(name, url);
        apis.insert(
            id.clone(),
            CustomApi {
                name: name.to_string(),
                url: url.to_string(),
                kind: if kind.is_empty() { DEFAULT_API_TYPE } else { kind }.to_string(),
                added: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            },
        );

        self.save(&apis)?;
        debug!("Custom API added: {} ({})", name, url);
        Ok((id, apis))
    }

    /// Remove a registration, returns the updated registrations
    pub fn remove(&self, id: &str) -> Result<CustomApis> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::rejected("API ID is required"));
        }

        let mut apis = self.list();
        let Some(removed) = apis.shift_remove(id) else {
            return Err(Error::rejected("Custom API not found"));
        };

        self.save(&apis)?;
        debug!("Custom API removed: {}", removed.name);
        Ok(apis)
    }

    fn save(&self, apis: &CustomApis) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(apis)?)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}
