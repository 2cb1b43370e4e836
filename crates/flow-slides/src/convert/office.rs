//! General office suite in headless mode (`soffice --convert-to pdf`).
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::PdfExporter;
use crate::deck::Deck;
use crate::error::{Result, SlideError};

const TAG: &str = "office";

/// Binary names tried on the search path, in order.
const BINARY_NAMES: &[&str] = &["soffice", "libreoffice"];

#[cfg(windows)]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &["/Applications/LibreOffice.app/Contents/MacOS/soffice"];

#[cfg(not(any(windows, target_os = "macos")))]
const INSTALL_PATHS: &[&str] = &[
    "/usr/bin/soffice",
    "/usr/lib/libreoffice/program/soffice",
    "/opt/libreoffice/program/soffice",
    "/snap/bin/libreoffice",
];

pub struct OfficeExporter {
    exe: PathBuf,
}

impl OfficeExporter {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// Exporter that trusts `soffice` to be resolvable at conversion time.
    /// Used when nothing was discovered; conversions then fail and every
    /// slide renders as the placeholder.
    pub fn fallback() -> Self {
        Self::new(BINARY_NAMES[0])
    }

    /// Find the suite: explicit path first, then common install locations,
    /// then the search path.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            debug!(path = %path.display(), "configured office binary does not exist");
        }
        INSTALL_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .or_else(|| BINARY_NAMES.iter().find_map(|name| which::which(name).ok()))
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }
}

impl PdfExporter for OfficeExporter {
    fn tag(&self) -> &str {
        TAG
    }

    fn name(&self) -> &str {
        "Office suite (headless)"
    }

    fn export_pdf(&self, deck: &Deck, work_dir: &Path) -> Result<PathBuf> {
        debug!(deck = %deck.path.display(), exe = %self.exe.display(), "converting with office suite");
        // A private profile keeps headless runs independent of an office
        // window the operator may have open.
        let profile = work_dir.join("profile");
        let output = Command::new(&self.exe)
            .arg(format!("-env:UserInstallation={}", file_url(&profile)))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(work_dir)
            .arg(&deck.path)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(SlideError::toolchain(
                "soffice",
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let produced = find_produced_pdf(work_dir, deck.file_stem())?;
        let target = work_dir.join("deck.pdf");
        std::fs::rename(&produced, &target)?;
        Ok(target)
    }
}

/// The suite names its output after the input stem. Fall back to any PDF in
/// the directory when the stem was mangled (non-ASCII names on some builds).
fn find_produced_pdf(dir: &Path, stem: &str) -> Result<PathBuf> {
    let expected = dir.join(format!("{stem}.pdf"));
    if expected.is_file() {
        return Ok(expected);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            return Ok(path);
        }
    }
    Err(SlideError::toolchain(
        "soffice",
        format!("no PDF produced in {}", dir.display()),
    ))
}

fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}
