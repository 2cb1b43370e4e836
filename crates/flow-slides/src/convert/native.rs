//! PowerPoint automation through PowerShell COM interop (Windows only).
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::{BUSY_RETRY_DELAY, PdfExporter, retry_transient};
use crate::deck::Deck;
use crate::error::{Result, SlideError};

const TAG: &str = "powerpoint";
const PP_SAVE_AS_PDF: u32 = 32;

/// Messages PowerPoint reports when the file is still held by the process that
/// just wrote it.
const BUSY_MARKERS: &[&str] = &[
    "cannot open",
    "being used by another process",
    "is locked",
    "0x80070020",
];

pub struct PowerPointExporter {
    powershell: PathBuf,
}

impl PowerPointExporter {
    /// Detect an installed PowerPoint. Always `None` off Windows.
    pub fn detect() -> Option<Self> {
        if !cfg!(windows) {
            return None;
        }
        let powershell = which::which("powershell").ok()?;
        let registered = Command::new("reg")
            .args(["query", r"HKEY_CLASSES_ROOT\PowerPoint.Application"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        registered.then_some(Self { powershell })
    }

    fn run(&self, script: &str, deck: &Path) -> Result<()> {
        let output = Command::new(&self.powershell)
            .args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass"])
            .arg("-Command")
            .arg(script)
            .stdin(Stdio::null())
            .output()?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Err(classify_failure(deck, &stderr))
    }
}

impl PdfExporter for PowerPointExporter {
    fn tag(&self) -> &str {
        TAG
    }

    fn name(&self) -> &str {
        "PowerPoint"
    }

    fn export_pdf(&self, deck: &Deck, work_dir: &Path) -> Result<PathBuf> {
        let out = work_dir.join("deck.pdf");
        let script = export_script(&deck.path, &out);
        debug!(deck = %deck.path.display(), "exporting through PowerPoint");
        retry_transient(BUSY_RETRY_DELAY, || self.run(&script, &deck.path))?;
        Ok(out)
    }
}

fn classify_failure(deck: &Path, stderr: &str) -> SlideError {
    let lower = stderr.to_ascii_lowercase();
    if BUSY_MARKERS.iter().any(|m| lower.contains(m)) {
        SlideError::Busy(deck.to_path_buf())
    } else {
        SlideError::toolchain("PowerPoint", stderr.trim())
    }
}

/// Open read-only without a window, save as PDF, close. PowerPoint is only
/// quit when no other presentations are open in the user's session.
fn export_script(deck: &Path, out: &Path) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'\n\
         $app = New-Object -ComObject PowerPoint.Application\n\
         try {{\n\
         \x20 $pres = $app.Presentations.Open({input}, -1, 0, 0)\n\
         \x20 try {{ $pres.SaveAs({output}, {format}) }} finally {{ $pres.Close() }}\n\
         }} finally {{\n\
         \x20 if ($app.Presentations.Count -eq 0) {{ $app.Quit() }}\n\
         \x20 [void][System.Runtime.InteropServices.Marshal]::ReleaseComObject($app)\n\
         }}\n",
        input = ps_quote(&deck.to_string_lossy()),
        output = ps_quote(&out.to_string_lossy()),
        format = PP_SAVE_AS_PDF,
    )
}

/// Single-quoted PowerShell literal.
fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
