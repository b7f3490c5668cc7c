//! Radio Browser client library for PMORadio
//!
//! This crate resolves and caches the data of the community
//! [Radio Browser](https://www.radio-browser.info) directory for a small
//! radio player UI.
//!
//! # Features
//!
//! - **Mirror Directory**: Discovers the live API mirrors, caches the list
//!   and falls back to a built-in list when discovery fails
//! - **Failover Requests**: Each request walks the mirrors sequentially until
//!   one answers with JSON
//! - **Response Caching**: Search results, countries, genres and top stations
//!   are cached with per-kind TTLs (see [`pmocache::TtlCache`])
//! - **Logo Caching**: Station favicons are served from a bounded local cache
//!   (see [`pmocovers::LogoCache`])
//! - **Recently Played**: A short most-recent-first ledger, safe against
//!   concurrent writers
//! - **UI Operations**: Every operation of [`RadioBrowser`] answers with an
//!   [`Envelope`], never with an error
//!
//! # Example
//!
//! ```no_run
//! use pmocache::TtlCache;
//! use pmoradiobrowser::{FailoverClient, RadioBrowser, SearchFilters};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = TtlCache::file("cache_radiobrowser")?;
//!     let client = FailoverClient::builder().cache(cache.clone()).build()?;
//!     let service = RadioBrowser::builder(client, cache, "data").build()?;
//!
//!     let filters = SearchFilters {
//!         tag: Some("jazz".into()),
//!         ..Default::default()
//!     };
//!     let answer = service.search(&filters).await;
//!     println!("{}", serde_json::to_string_pretty(&answer)?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Extension
//!
//! With the `pmoconfig` feature (default), [`RadioBrowserConfigExt`] builds a
//! fully configured service from `pmoconfig::Config`.
//!
//! # Server Feature
//!
//! With the `server` feature, [`api_rest::create_router`] exposes the
//! operations as an axum router.

pub mod client;
pub mod custom_apis;
pub mod envelope;
pub mod error;
pub mod favorites;
pub mod ledger;
pub mod maintenance;
pub mod mirrors;
pub mod models;
pub mod player;
pub mod service;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

#[cfg(feature = "server")]
pub mod api_rest;

pub use client::{ClientBuilder, FailoverClient};
pub use custom_apis::{custom_api_id, CustomApi, CustomApiRegistry, CustomApis};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use favorites::{FavoriteStation, FavoritesStore, SqliteFavorites};
pub use ledger::{RecentEntry, RecentlyPlayed};
pub use maintenance::{MaintenanceError, MaintenanceRunner, ScriptRunner};
pub use mirrors::MirrorDirectory;
pub use models::{MirrorStatus, PlayerStatus, SearchFilters, Station};
pub use player::{NoPlayer, Player, PlayerError};
pub use service::{CacheTtls, RadioBrowser, RadioBrowserBuilder};

#[cfg(feature = "pmoconfig")]
pub use config_ext::RadioBrowserConfigExt;
