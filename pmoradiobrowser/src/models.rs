//! Data models for the Radio Browser API and the UI-facing operations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default page size of a search
pub const DEFAULT_SEARCH_LIMIT: u32 = 30;

/// Default sort order of a search
pub const DEFAULT_SEARCH_ORDER: &str = "clickcount";

/// Name recorded when a played station has none
pub const DEFAULT_STATION_NAME: &str = "Radio Browser Station";

/// Name stored when a favorite station has none
pub const UNKNOWN_STATION_NAME: &str = "Unknown Station";

/// Logo reference meaning "use the player's placeholder"
pub const LOCAL_LOGO: &str = "local";

/// A station as exchanged with the UI
///
/// Only the fields this layer reads are typed. Everything else the directory
/// returns is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stationuuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_resolved: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countrycode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Station {
    /// Stream URL, trimmed, `None` when missing or blank
    pub fn stream_url(&self) -> Option<&str> {
        non_blank(self.url.as_deref())
    }

    /// Station name, trimmed, `None` when missing or blank
    pub fn display_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    /// Favicon URL, trimmed, `None` when missing or blank
    pub fn favicon_url(&self) -> Option<&str> {
        non_blank(self.favicon.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Search criteria accepted from the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub countrycode: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub reverse: Option<bool>,
}

impl SearchFilters {
    /// Query parameters sent upstream, defaults applied and blanks dropped
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").to_string();

        let order = match self.order.as_deref().map(str::trim) {
            Some(o) if !o.is_empty() => o.to_string(),
            _ => DEFAULT_SEARCH_ORDER.to_string(),
        };

        let params = vec![
            ("name", text(&self.name)),
            ("countrycode", text(&self.countrycode)),
            ("tag", text(&self.tag)),
            ("offset", self.offset.unwrap_or(0).to_string()),
            ("limit", self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).to_string()),
            ("order", order),
            ("reverse", self.reverse.unwrap_or(true).to_string()),
        ];

        params.into_iter().filter(|(_, v)| !v.is_empty()).collect()
    }
}

/// Health of one mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorStatus {
    pub server: String,
    pub online: bool,
    /// Round-trip time of the probe, 0 when offline
    pub latency_ms: u64,
    pub url: String,
}

/// Player state as reported to the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub playing: bool,
    pub current_url: Option<String>,
}
