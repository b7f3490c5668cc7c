//! Logos permanents des stations favorites
//!
//! À l'ajout d'une station aux favoris, son favicon est converti en trois
//! JPEG carrés sur fond blanc :
//!
//! - `{root}/{nom}.jpg` (400×400)
//! - `{root}/thumbs/{nom}.jpg` (200×200)
//! - `{root}/thumbs/{nom}_sm.jpg` (80×80)

use anyhow::{anyhow, bail, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use pmocache::hash_key;
use reqwest::{redirect, Client, StatusCode};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const MAIN_SIZE: u32 = 400;
const THUMB_SIZE: u32 = 200;
const SMALL_SIZE: u32 = 80;
const JPEG_QUALITY: u8 = 85;

/// En dessous de cette taille, la réponse n'est pas une image exploitable
const MIN_IMAGE_BYTES: usize = 100;

/// Chemins des trois variantes d'un logo permanent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoSet {
    pub main: PathBuf,
    pub thumb: PathBuf,
    pub small: PathBuf,
}

impl LogoSet {
    fn for_name(root: &Path, safe_name: &str) -> Self {
        let thumbs = root.join("thumbs");
        Self {
            main: root.join(format!("{safe_name}.jpg")),
            thumb: thumbs.join(format!("{safe_name}.jpg")),
            small: thumbs.join(format!("{safe_name}_sm.jpg")),
        }
    }
}

/// Nettoie un nom de station pour en faire un nom de fichier
///
/// Seuls les caractères alphanumériques ASCII, `-`, `_` et les espaces sont
/// conservés. Un nom vide après nettoyage est remplacé par
/// `station_{hash}`.
pub fn sanitize_station_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        format!("station_{}", &hash_key(name)[..32])
    } else {
        cleaned.to_string()
    }
}

/// Redimensionne l'image pour tenir dans un carré et la centre sur fond blanc
fn square_on_white(img: &DynamicImage, size: u32) -> RgbaImage {
    let (width, height) = (img.width().max(1), img.height().max(1));
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);

    let new_width = ((width as f32 * scale) as u32).clamp(1, size);
    let new_height = ((height as f32 * scale) as u32).clamp(1, size);
    let resized = img
        .resize_exact(new_width, new_height, FilterType::Lanczos3)
        .to_rgba8();

    let mut square = RgbaImage::from_pixel(size, size, Rgba([255, 255, 255, 255]));
    let x = (size - new_width) / 2;
    let y = (size - new_height) / 2;
    image::imageops::overlay(&mut square, &resized, x.into(), y.into());

    square
}

fn write_jpeg(img: &RgbaImage, path: &Path) -> Result<()> {
    let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(())
}

/// Convertit une image (PNG, GIF, WEBP, JPEG...) en logo permanent
///
/// Fonction synchrone, à appeler via `spawn_blocking` depuis du code async.
pub fn save_permanent_logo(root: &Path, station_name: &str, data: &[u8]) -> Result<LogoSet> {
    if station_name.is_empty() || data.is_empty() {
        bail!("Empty station name or image data");
    }

    let img = image::load_from_memory(data)
        .map_err(|e| anyhow!("Cannot decode image for {}: {}", station_name, e))?;

    let set = LogoSet::for_name(root, &sanitize_station_name(station_name));
    fs::create_dir_all(root.join("thumbs"))?;

    write_jpeg(&square_on_white(&img, MAIN_SIZE), &set.main)?;
    write_jpeg(&square_on_white(&img, THUMB_SIZE), &set.thumb)?;
    write_jpeg(&square_on_white(&img, SMALL_SIZE), &set.small)?;

    info!("Saved permanent logo for {} to {}", station_name, set.main.display());
    Ok(set)
}

/// Import des logos permanents depuis l'URL d'un favicon
#[derive(Debug, Clone)]
pub struct PermanentLogos {
    root: PathBuf,
    http: Client,
}

impl PermanentLogos {
    pub fn new<P: AsRef<Path>>(root: P, user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(3))
            .build()?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            http,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Télécharge le favicon et produit le logo permanent de la station
    ///
    /// `None` en cas d'échec : la station est alors enregistrée sans logo.
    pub async fn import(&self, station_name: &str, favicon_url: &str) -> Option<LogoSet> {
        let data = match self.download(favicon_url).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Failed to download favicon for {}: {}", station_name, e);
                return None;
            }
        };

        let root = self.root.clone();
        let name = station_name.to_string();
        let result =
            tokio::task::spawn_blocking(move || save_permanent_logo(&root, &name, &data)).await;

        match result {
            Ok(Ok(set)) => Some(set),
            Ok(Err(e)) => {
                debug!("Cannot save permanent logo for {}: {}", station_name, e);
                None
            }
            Err(e) => {
                debug!("Logo conversion task failed: {}", e);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        if response.status() != StatusCode::OK {
            bail!("HTTP {}", response.status());
        }

        let data = response.bytes().await?;
        if data.len() <= MIN_IMAGE_BYTES {
            bail!("response too small ({} bytes)", data.len());
        }
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_sanitize_station_name() {
        assert_eq!(sanitize_station_name("FIP Jazz!"), "FIP Jazz");
        assert_eq!(sanitize_station_name("  Radio/Nova  "), "RadioNova");
        assert_eq!(sanitize_station_name("a-b_c"), "a-b_c");

        let fallback = sanitize_station_name("¡¿!");
        assert!(fallback.starts_with("station_"));
        assert_eq!(fallback, sanitize_station_name("¡¿!"));
    }

    #[test]
    fn test_save_permanent_logo_writes_three_squares() {
        let dir = tempfile::tempdir().unwrap();
        let set = save_permanent_logo(dir.path(), "Wide Radio", &png_bytes(300, 100)).unwrap();

        assert_eq!(set.main, dir.path().join("Wide Radio.jpg"));
        assert_eq!(set.small, dir.path().join("thumbs").join("Wide Radio_sm.jpg"));

        for (path, size) in [(&set.main, 400), (&set.thumb, 200), (&set.small, 80)] {
            let img = image::open(path).unwrap();
            assert_eq!((img.width(), img.height()), (size, size));
        }

        // Les bandes de remplissage sont blanches
        let main = image::open(&set.main).unwrap().to_rgb8();
        let corner = main.get_pixel(0, 0);
        assert!(corner.0.iter().all(|c| *c > 240));
    }

    #[test]
    fn test_save_permanent_logo_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_permanent_logo(dir.path(), "Broken", b"not an image at all").is_err());
        assert!(save_permanent_logo(dir.path(), "", &png_bytes(10, 10)).is_err());
    }
}
