use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SlideError};

/// A presentation file on disk.
///
/// The path is canonical and the modification time is captured when the deck is
/// opened, so two `Deck`s for the same file compare equal only while the file is
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub len: u64,
}

impl Deck {
    /// Resolve `path` and capture its identity. Fails for missing, non-file and
    /// zero-byte inputs.
    pub fn open(path: &Path) -> Result<Self> {
        let path = path
            .canonicalize()
            .map_err(|_| SlideError::MissingInput(path.to_path_buf()))?;
        let meta = std::fs::metadata(&path)?;
        if !meta.is_file() {
            return Err(SlideError::MissingInput(path));
        }
        if meta.len() == 0 {
            return Err(SlideError::EmptyInput(path));
        }
        Ok(Self {
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
            len: meta.len(),
            path,
        })
    }

    /// Modification time as nanoseconds since the epoch, for cache keys.
    pub fn modified_nanos(&self) -> u128 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    }

    pub fn file_stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("deck")
    }

    /// Number of slides, read from the container without rendering anything.
    pub fn slide_count(&self) -> Result<usize> {
        read_slide_count(&self.path)
    }
}

/// Read how many slides a presentation holds.
///
/// `.pptx` decks are counted by their `ppt/slides/slideN.xml` parts and `.odp`
/// decks by the `draw:page` elements of `content.xml`.
pub fn read_slide_count(path: &Path) -> Result<usize> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pptx" | "pptm" | "ppsx" => count_pptx_slides(path),
        "odp" => count_odp_pages(path),
        _ => Err(SlideError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn count_pptx_slides(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let archive = zip::ZipArchive::new(file)?;
    Ok(archive.file_names().filter(|name| is_slide_part(name)).count())
}

/// `ppt/slides/slide12.xml`, but not the `_rels` or layout parts.
fn is_slide_part(name: &str) -> bool {
    name.strip_prefix("ppt/slides/slide")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn count_odp_pages(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut content = String::new();
    archive.by_name("content.xml")?.read_to_string(&mut content)?;
    Ok(content.matches("<draw:page ").count())
}
