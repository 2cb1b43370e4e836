//! Standalone document-builder engine bundled with the application.
//!
//! The builder is driven by a small script file. Builds assume a single
//! running instance (shared temp and font caches), so every invocation in the
//! process is serialized on [`BUILDER_LOCK`].
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::PdfExporter;
use crate::deck::Deck;
use crate::error::{Result, SlideError};

static BUILDER_LOCK: Mutex<()> = Mutex::new(());

pub struct DocBuilderExporter {
    exe: PathBuf,
    tag: String,
}

impl DocBuilderExporter {
    /// `variant` names the bundle folder the binary was found in and becomes
    /// part of the cache tag.
    pub fn new(exe: impl Into<PathBuf>, variant: &str) -> Self {
        Self {
            exe: exe.into(),
            tag: format!("docbuilder-{variant}"),
        }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }
}

impl PdfExporter for DocBuilderExporter {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn name(&self) -> &str {
        "Document Builder"
    }

    fn export_pdf(&self, deck: &Deck, work_dir: &Path) -> Result<PathBuf> {
        let out = work_dir.join("deck.pdf");
        let tmp = work_dir.join("tmp");
        std::fs::create_dir_all(&tmp)?;

        let script_path = work_dir.join("convert.docbuilder");
        std::fs::write(&script_path, build_script(&deck.path, &out, &tmp))?;

        let mut cmd = Command::new(&self.exe);
        cmd.arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The builder locates its fonts and resources relative to itself.
        if let Some(dir) = self.exe.parent() {
            cmd.current_dir(dir);
        }

        let output = {
            let _guard = BUILDER_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            debug!(deck = %deck.path.display(), "running document builder");
            cmd.output()?
        };

        if !output.status.success() {
            return Err(SlideError::toolchain(
                "docbuilder",
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(out)
    }
}

fn build_script(deck: &Path, out: &Path, tmp: &Path) -> String {
    format!(
        "builder.SetTmpFolder({tmp});\n\
         builder.OpenFile({input}, \"\");\n\
         builder.SaveFile(\"pdf\", {output});\n\
         builder.CloseFile();\n",
        tmp = js_quote(&tmp.to_string_lossy()),
        input = js_quote(&deck.to_string_lossy()),
        output = js_quote(&out.to_string_lossy()),
    )
}

/// Double-quoted script string literal.
fn js_quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}
