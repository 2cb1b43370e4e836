//! Presentation → slide image conversion.
//!
//! Every toolchain follows the same shape: convert the whole deck to one PDF,
//! rasterize all of its pages into the cache in one pass, then serve single
//! slides from the cache. Only the PDF step differs between toolchains, so it
//! is the [`PdfExporter`] seam; [`CachedEngine`] owns everything else.

pub mod cache;
pub mod docbuilder;
pub mod native;
pub mod office;
pub mod raster;
pub mod select;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::deck::Deck;
use crate::error::{Result, SlideError};

use cache::{CacheKey, SlideCache};
use raster::Rasterizer;

pub type SlideImage = RgbaImage;

pub const PLACEHOLDER_WIDTH: u32 = 1280;
pub const PLACEHOLDER_HEIGHT: u32 = 720;
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([64, 64, 64, 255]);

/// Twice the 72 DPI PDF user space.
pub const DEFAULT_DPI: u32 = 144;

/// Pause before the single retry of a transient failure.
pub const BUSY_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Image shown in place of a slide that could not be produced.
pub fn placeholder() -> SlideImage {
    RgbaImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, PLACEHOLDER_FILL)
}

/// Produces slide images for presentation files.
pub trait ConverterEngine: Send + Sync {
    /// Diagnostic name of the active toolchain.
    fn name(&self) -> &str;

    /// Path of the cached image for `index`, converting the deck first if needed.
    fn ensure_cached(&self, deck: &Path, index: usize) -> Result<PathBuf>;

    /// Slide count of `deck` without rendering.
    fn slide_count(&self, deck: &Path) -> Result<usize>;

    /// Drop every cached image of `deck`.
    fn clear_cache(&self, deck: &Path) -> Result<bool>;

    /// Image for slide `index`. Never fails: anything that goes wrong is logged
    /// and yields the placeholder.
    fn render(&self, deck: &Path, index: usize) -> SlideImage {
        let loaded = self
            .ensure_cached(deck, index)
            .and_then(|path| Ok(image::open(path)?.to_rgba8()));
        match loaded {
            Ok(image) => image,
            Err(err) => {
                warn!(deck = %deck.display(), index, engine = self.name(), "slide unavailable: {err}");
                placeholder()
            }
        }
    }
}

/// The toolchain-specific step: turn a deck into one multi-page PDF.
pub trait PdfExporter: Send + Sync + 'static {
    /// Cache namespace; changes whenever output of the toolchain may change.
    fn tag(&self) -> &str;

    fn name(&self) -> &str;

    /// Write a PDF of `deck` somewhere inside `work_dir` and return its path.
    fn export_pdf(&self, deck: &Deck, work_dir: &Path) -> Result<PathBuf>;
}

/// Run `f`, and once more after `delay` if the first attempt failed with a
/// transient error.
pub fn retry_transient<T>(delay: Duration, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    match f() {
        Err(err) if err.is_transient() => {
            warn!("{err}; retrying in {delay:?}");
            std::thread::sleep(delay);
            f()
        }
        other => other,
    }
}

/// A [`PdfExporter`] plus rasterizer behind a content-addressed cache.
pub struct CachedEngine {
    exporter: Box<dyn PdfExporter>,
    rasterizer: Box<dyn Rasterizer>,
    cache: SlideCache,
    dpi: u32,
    convert_lock: Mutex<()>,
}

impl CachedEngine {
    pub fn new(
        exporter: Box<dyn PdfExporter>,
        rasterizer: Box<dyn Rasterizer>,
        cache_root: &Path,
        dpi: u32,
    ) -> Self {
        let cache = SlideCache::new(cache_root, exporter.tag());
        Self {
            exporter,
            rasterizer,
            cache,
            dpi,
            convert_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &SlideCache {
        &self.cache
    }

    pub fn rasterizer(&self) -> &dyn Rasterizer {
        self.rasterizer.as_ref()
    }

    fn convert_deck(&self, deck: &Deck, key: &CacheKey) -> Result<()> {
        fs::create_dir_all(key.dir())?;

        let pdf = key.pdf_path();
        if !pdf.is_file() {
            info!(deck = %deck.path.display(), engine = self.name(), "converting deck to PDF");
            let work_dir = key.dir().join("export");
            let _ = fs::remove_dir_all(&work_dir);
            fs::create_dir_all(&work_dir)?;

            let produced = self.exporter.export_pdf(deck, &work_dir)?;
            if !produced.is_file() {
                return Err(SlideError::toolchain(
                    self.exporter.name(),
                    format!("expected PDF at {}", produced.display()),
                ));
            }
            fs::rename(&produced, &pdf)?;
            let _ = fs::remove_dir_all(&work_dir);
        }

        let staging = key.dir().join("staging");
        let _ = fs::remove_dir_all(&staging);
        let pages = self.rasterizer.rasterize(&pdf, &staging, self.dpi)?;
        for (index, page) in pages.iter().enumerate() {
            fs::rename(page, key.slide_path(index))?;
        }
        key.record_page_count(pages.len())?;
        let _ = fs::remove_dir_all(&staging);

        info!(deck = %deck.path.display(), pages = pages.len(), "deck rasterized");
        Ok(())
    }
}

impl ConverterEngine for CachedEngine {
    fn name(&self) -> &str {
        self.exporter.name()
    }

    fn ensure_cached(&self, path: &Path, index: usize) -> Result<PathBuf> {
        let deck = Deck::open(path)?;
        let key = self.cache.key(&deck);
        let slide = key.slide_path(index);
        let missing = || SlideError::MissingOutput {
            deck: deck.path.clone(),
            index,
        };

        if slide.is_file() {
            return Ok(slide);
        }
        if key.page_count().is_some_and(|pages| index >= pages) {
            return Err(missing());
        }

        let _guard = self
            .convert_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Another caller may have converted the deck while we waited.
        if !slide.is_file() {
            debug!(deck = %deck.path.display(), index, "cache miss");
            self.convert_deck(&deck, &key)?;
        }

        if slide.is_file() {
            Ok(slide)
        } else {
            Err(missing())
        }
    }

    fn slide_count(&self, path: &Path) -> Result<usize> {
        let deck = Deck::open(path)?;
        match self.cache.key(&deck).page_count() {
            Some(pages) => Ok(pages),
            None => deck.slide_count(),
        }
    }

    fn clear_cache(&self, deck: &Path) -> Result<bool> {
        let removed = self.cache.clear(deck)?;
        if removed {
            info!(deck = %deck.display(), "slide cache cleared");
        }
        Ok(removed)
    }
}
