//! Turn a multi-page PDF into one PNG per page.
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, SlideError};

/// Rasterizes every page of a PDF in one pass.
pub trait Rasterizer: Send + Sync + 'static {
    /// Render all pages of `pdf` into `out_dir` at `dpi`, returning the page
    /// images in page order.
    fn rasterize(&self, pdf: &Path, out_dir: &Path, dpi: u32) -> Result<Vec<PathBuf>>;

    fn describe(&self) -> String;
}

/// `pdftoppm` from poppler.
pub struct PdfToPpm {
    exe: PathBuf,
}

impl PdfToPpm {
    pub fn new() -> Result<Self> {
        let exe = which::which("pdftoppm").map_err(|e| {
            SlideError::toolchain("pdftoppm", format!("not found on PATH: {e}"))
        })?;
        Ok(Self { exe })
    }

    pub fn with_exe(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }
}

impl Rasterizer for PdfToPpm {
    fn rasterize(&self, pdf: &Path, out_dir: &Path, dpi: u32) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        debug!(pdf = %pdf.display(), dpi, "rasterizing");

        let dpi = dpi.to_string();
        let output = Command::new(&self.exe)
            .stdin(Stdio::null())
            .args(["-png", "-r", &dpi])
            .arg(pdf)
            .arg(out_dir.join("page"))
            .output()?;

        if !output.status.success() {
            return Err(SlideError::toolchain(
                "pdftoppm",
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        collect_pages(out_dir, "page")
    }

    fn describe(&self) -> String {
        format!("pdftoppm ({})", self.exe.display())
    }
}

impl fmt::Debug for PdfToPpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfToPpm").field("exe", &self.exe).finish()
    }
}

/// Collect `<prefix>-N.png` files sorted by page number. pdftoppm zero-pads
/// the number depending on the page count, so sort numerically.
pub fn collect_pages(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(number) = page_number(&path, prefix) {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

fn page_number(path: &Path, prefix: &str) -> Option<usize> {
    if path.extension().and_then(|e| e.to_str()) != Some("png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}
