use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use xxhash_rust::xxh3::Xxh3;

use crate::deck::Deck;

const PDF_NAME: &str = "deck.pdf";
const PAGES_MARKER: &str = "pages.count";

/// Default cache root, inside the system temp directory.
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("flow-slides-cache")
}

/// On-disk slide cache for one toolchain.
///
/// Layout: `<root>/<tag>/<path-hash>/<version-hash>/slide-NNNN.png`. The
/// path hash groups every version of a deck so clearing removes all of them;
/// the version hash covers the modification time so an edited deck never hits
/// stale images.
#[derive(Debug, Clone)]
pub struct SlideCache {
    root: PathBuf,
    tag: String,
}

/// Cache location of one deck version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    dir: PathBuf,
}

impl SlideCache {
    pub fn new(root: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            tag: tag.into(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn namespace(&self) -> PathBuf {
        self.root.join(&self.tag)
    }

    pub fn key(&self, deck: &Deck) -> CacheKey {
        let mut version = Fingerprint::new();
        version.write_str(&self.tag);
        version.write_str(&deck.path.to_string_lossy());
        version.write_u128(deck.modified_nanos());
        version.write_u64(deck.len);

        CacheKey {
            dir: self
                .deck_root(&deck.path)
                .join(version.finish_hex()),
        }
    }

    /// Directory holding every cached version of the deck at `path`.
    pub fn deck_root(&self, path: &Path) -> PathBuf {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut h = Fingerprint::new();
        h.write_str(&self.tag);
        h.write_str(&canonical.to_string_lossy());
        self.namespace().join(h.finish_hex())
    }

    /// Delete every cached image of the deck at `path`. Returns whether
    /// anything was removed.
    pub fn clear(&self, path: &Path) -> io::Result<bool> {
        let root = self.deck_root(path);
        match fs::remove_dir_all(&root) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl CacheKey {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slide_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("slide-{index:04}.png"))
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.dir.join(PDF_NAME)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.slide_path(index).is_file()
    }

    /// Page count recorded after the deck was fully rasterized.
    pub fn page_count(&self) -> Option<usize> {
        fs::read_to_string(self.dir.join(PAGES_MARKER))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn record_page_count(&self, pages: usize) -> io::Result<()> {
        publish(&self.dir.join(PAGES_MARKER), pages.to_string().as_bytes())
    }
}

/// Write `contents` next to `path` and rename it into place, so readers only
/// ever see complete files.
pub fn publish(path: &Path, contents: &[u8]) -> io::Result<()> {
    let staging = path.with_extension("partial");
    fs::write(&staging, contents)?;
    fs::rename(&staging, path)
}

const FINGERPRINT_SEED: u64 = 0x5f1d_e5a7_c0ff_ee11;

/// Seeded xxh3 stream giving a 128-bit key that is stable across runs and
/// platforms.
struct Fingerprint {
    inner: Xxh3,
}

impl Fingerprint {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(FINGERPRINT_SEED),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u128(&mut self, v: u128) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn finish_hex(&self) -> String {
        format!("{:032x}", self.inner.digest128())
    }
}
