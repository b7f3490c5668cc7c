//! # pmocovers - Cache des logos de stations pour PMORadio
//!
//! Cette crate gère les images associées aux stations de radio :
//!
//! - Un cache disque borné des logos distants ([`LogoCache`]), pour ne pas
//!   faire charger par l'interface des images hébergées sur des serveurs
//!   lents ou peu fiables.
//! - Des logos permanents ([`PermanentLogos`]) produits à l'ajout d'une
//!   station aux favoris : trois variantes JPEG carrées sur fond blanc.
//!
//! ## Politique du cache
//!
//! - Une image est identifiée par le hash SHA-256 de son URL d'origine.
//! - Au-delà d'une taille unitaire (50 000 octets par défaut) l'image n'est
//!   pas conservée et l'URL d'origine reste utilisée.
//! - La taille totale du répertoire est bornée (1 Mio par défaut) : les
//!   fichiers les plus anciens sont évincés avant chaque écriture.
//! - Une image de moins de 24 h est resservie sans accès réseau.
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmocovers::{LogoCache, LogoCacheSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = LogoCache::new("./cache_radiobrowser/images", LogoCacheSettings::default())?;
//!     if let Some(local) = cache.fetch_and_cache("https://example.com/logo.png").await {
//!         println!("Logo servi localement: {local}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod logo_cache;
pub mod permanent;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use logo_cache::{enforce_ceiling, sniff_content_type, LogoCache, LogoCacheSettings};
pub use permanent::{sanitize_station_name, save_permanent_logo, LogoSet, PermanentLogos};

#[cfg(feature = "pmoconfig")]
pub use config_ext::LogoCacheConfigExt;
