//! Cache disque borné des logos de stations
//!
//! Chaque logo est stocké sous `{cache_dir}/{sha256(url)}`, sans extension :
//! le type est retrouvé à la lecture depuis les premiers octets.

use anyhow::{bail, Result};
use pmocache::hash_key;
use reqwest::{redirect, Client, StatusCode};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Réglages du cache de logos
#[derive(Debug, Clone)]
pub struct LogoCacheSettings {
    /// Taille totale maximale du répertoire
    pub max_total_bytes: u64,
    /// Une image de cette taille ou plus n'est pas conservée
    pub max_item_bytes: u64,
    /// Âge au-delà duquel une image est retéléchargée
    pub ttl: Duration,
    /// Délai maximal d'un téléchargement
    pub fetch_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Préfixe des références locales retournées (ex: `/logos`)
    pub public_prefix: String,
}

impl Default for LogoCacheSettings {
    fn default() -> Self {
        Self {
            max_total_bytes: 1024 * 1024,
            max_item_bytes: 50_000,
            ttl: Duration::from_secs(24 * 3600),
            fetch_timeout: Duration::from_secs(5),
            max_redirects: 3,
            user_agent: "pmoradio-radio-browser/1.0".to_string(),
            public_prefix: "/logos".to_string(),
        }
    }
}

/// Cache de logos distants
///
/// Toutes les opérations publiques sont infaillibles du point de vue de
/// l'appelant : en cas d'échec, l'URL d'origine doit simplement être utilisée.
#[derive(Debug, Clone)]
pub struct LogoCache {
    dir: PathBuf,
    settings: LogoCacheSettings,
    http: Client,
}

impl LogoCache {
    /// Crée le cache, en créant le répertoire si nécessaire
    pub fn new<P: AsRef<Path>>(dir: P, settings: LogoCacheSettings) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created logo cache directory: {}", dir.display());
        }

        let http = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.fetch_timeout)
            .redirect(redirect::Policy::limited(settings.max_redirects))
            .build()?;

        Ok(Self {
            dir,
            settings,
            http,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings(&self) -> &LogoCacheSettings {
        &self.settings
    }

    /// Nom du fichier local d'une URL
    pub fn file_name(url: &str) -> String {
        hash_key(url)
    }

    /// Chemin du fichier local d'une URL
    pub fn file_path(&self, url: &str) -> PathBuf {
        self.dir.join(Self::file_name(url))
    }

    /// Référence publique d'un fichier du cache
    pub fn reference(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.settings.public_prefix.trim_end_matches('/'),
            file_name
        )
    }

    /// Retourne la référence locale d'une URL si elle est en cache et fraîche
    pub fn cached_reference(&self, url: &str) -> Option<String> {
        let path = self.file_path(url);
        if is_fresh(&path, self.settings.ttl) {
            Some(self.reference(&Self::file_name(url)))
        } else {
            None
        }
    }

    /// Retourne une référence locale vers le logo, en le téléchargeant si besoin
    ///
    /// `None` signifie que l'appelant doit conserver l'URL d'origine : URL
    /// vide, téléchargement en échec, statut différent de 200, image trop
    /// grosse ou écriture impossible.
    pub async fn fetch_and_cache(&self, url: &str) -> Option<String> {
        if url.is_empty() {
            return None;
        }

        if let Some(reference) = self.cached_reference(url) {
            debug!("Logo cache hit for {}", url);
            return Some(reference);
        }

        let data = match self.download(url).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Logo not cached {}: {}", url, e);
                return None;
            }
        };

        let path = self.file_path(url);
        match self.store_bytes(&path, &data) {
            Ok(true) => {
                debug!("Cached logo {} ({} bytes)", url, data.len());
                Some(self.reference(&Self::file_name(url)))
            }
            Ok(false) => None,
            Err(e) => {
                warn!("Cannot write logo {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let limit = self.settings.max_item_bytes;
        let mut response = self.http.get(url).send().await?;

        if response.status() != StatusCode::OK {
            bail!("HTTP {}", response.status());
        }

        if let Some(len) = response.content_length() {
            if len >= limit {
                bail!("announced size {} exceeds limit {}", len, limit);
            }
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            if data.len() as u64 >= limit {
                bail!("body exceeds limit {}", limit);
            }
        }

        if data.is_empty() {
            bail!("empty body");
        }
        Ok(data)
    }

    /// Écrit un logo après avoir libéré la place nécessaire
    ///
    /// Retourne `false` si l'image ne peut pas tenir dans le plafond.
    fn store_bytes(&self, path: &Path, data: &[u8]) -> io::Result<bool> {
        fs::create_dir_all(&self.dir)?;

        if !enforce_ceiling(
            &self.dir,
            data.len() as u64,
            self.settings.max_total_bytes,
            Some(path),
        )? {
            debug!("Logo of {} bytes does not fit the cache", data.len());
            return Ok(false);
        }

        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), n));
        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(true)
    }

    /// Lit un fichier du cache par son nom, pour le servir
    ///
    /// Seuls les noms produits par [`LogoCache::file_name`] sont acceptés.
    pub async fn read(&self, file_name: &str) -> Option<Vec<u8>> {
        let valid = file_name.len() == 64 && file_name.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return None;
        }
        tokio::fs::read(self.dir.join(file_name)).await.ok()
    }

    /// Taille totale des logos en cache
    pub fn total_bytes(&self) -> u64 {
        cached_files(&self.dir, None)
            .map(|files| files.iter().map(|f| f.size).sum())
            .unwrap_or(0)
    }

    /// Supprime tous les logos et retourne leur nombre
    pub fn clear(&self) -> usize {
        let Ok(files) = cached_files(&self.dir, None) else {
            return 0;
        };

        files
            .iter()
            .filter(|f| fs::remove_file(&f.path).is_ok())
            .count()
    }
}

fn is_fresh(path: &Path, ttl: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    age < ttl
}

#[derive(Debug)]
struct CachedFile {
    modified: SystemTime,
    path: PathBuf,
    size: u64,
}

fn cached_files(dir: &Path, excluded: Option<&Path>) -> io::Result<Vec<CachedFile>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_tmp = path.extension().is_some_and(|ext| ext == "tmp");
        if is_tmp || excluded == Some(path.as_path()) {
            continue;
        }

        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }

        files.push(CachedFile {
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            path,
            size: meta.len(),
        });
    }
    Ok(files)
}

/// Évince les fichiers les plus anciens jusqu'à pouvoir accueillir `incoming` octets
///
/// Les fichiers sont évincés par date de modification croissante, le nom
/// départageant les égalités. `replacing` désigne un fichier sur le point
/// d'être écrasé : il n'est ni compté ni évincé.
///
/// Retourne `true` si, après éviction, `total + incoming <= ceiling`.
pub fn enforce_ceiling(
    dir: &Path,
    incoming: u64,
    ceiling: u64,
    replacing: Option<&Path>,
) -> io::Result<bool> {
    if incoming > ceiling {
        return Ok(false);
    }

    let mut files = cached_files(dir, replacing)?;
    let mut total: u64 = files.iter().map(|f| f.size).sum();
    if total + incoming <= ceiling {
        return Ok(true);
    }

    files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

    for file in files {
        if total + incoming <= ceiling {
            break;
        }
        match fs::remove_file(&file.path) {
            Ok(()) => {
                total -= file.size;
                debug!("Evicted logo {}", file.path.display());
            }
            Err(e) => warn!("Cannot evict {}: {}", file.path.display(), e),
        }
    }

    Ok(total + incoming <= ceiling)
}

/// Type MIME d'une image d'après sa signature
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [0x00, 0x00, 0x01, 0x00, ..] => "image/x-icon",
        [b'B', b'M', ..] => "image/bmp",
        _ => {
            let head = String::from_utf8_lossy(&data[..data.len().min(256)]);
            let head = head.trim_start();
            if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
                "image/svg+xml"
            } else {
                "application/octet-stream"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn write_aged(dir: &Path, name: &str, size: usize, age_secs: u64) -> PathBuf {
        write_at(dir, name, size, SystemTime::now() - Duration::from_secs(age_secs))
    }

    fn write_at(dir: &Path, name: &str, size: usize, mtime: SystemTime) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; size]).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn test_enforce_ceiling_evicts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let oldest = write_aged(dir.path(), "a", 400, 300);
        let middle = write_aged(dir.path(), "b", 400, 200);
        let newest = write_aged(dir.path(), "c", 400, 100);

        // 1200 + 300 > 1000 : il faut libérer 500 octets, donc deux fichiers
        assert!(enforce_ceiling(dir.path(), 300, 1000, None).unwrap());
        assert!(!oldest.exists());
        assert!(!middle.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_enforce_ceiling_noop_when_room_left() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_aged(dir.path(), "a", 100, 10);

        assert!(enforce_ceiling(dir.path(), 100, 1000, None).unwrap());
        assert!(a.exists());
    }

    #[test]
    fn test_enforce_ceiling_ties_broken_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(50);
        let second = write_at(dir.path(), "bbb", 600, mtime);
        let first = write_at(dir.path(), "aaa", 600, mtime);

        assert!(enforce_ceiling(dir.path(), 100, 1000, None).unwrap());
        assert!(!first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_enforce_ceiling_ignores_file_being_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let replaced = write_aged(dir.path(), "old", 900, 500);
        let other = write_aged(dir.path(), "other", 50, 10);

        assert!(enforce_ceiling(dir.path(), 900, 1000, Some(&replaced)).unwrap());
        assert!(replaced.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_enforce_ceiling_rejects_oversized_incoming() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_aged(dir.path(), "a", 10, 10);

        assert!(!enforce_ceiling(dir.path(), 2000, 1000, None).unwrap());
        assert!(a.exists());
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n"), "image/png");
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a"), "image/gif");
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_content_type(b"  <svg xmlns=\"\"/>"), "image/svg+xml");
        assert_eq!(sniff_content_type(b"hello"), "application/octet-stream");
        assert_eq!(sniff_content_type(b""), "application/octet-stream");
    }
}
