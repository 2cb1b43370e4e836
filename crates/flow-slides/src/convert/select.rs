//! One-time startup probe choosing the conversion toolchain.
//!
//! Priority: native presentation program, then a bundled document builder,
//! then a headless office suite. When nothing is found an office exporter
//! pointing at a bare `soffice` is still returned so the rest of the
//! application works and renders placeholders.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::default_cache_root;
use super::docbuilder::DocBuilderExporter;
use super::native::PowerPointExporter;
use super::office::OfficeExporter;
use super::raster::{PdfToPpm, Rasterizer};
use super::{CachedEngine, ConverterEngine, DEFAULT_DPI, PdfExporter};

/// Which toolchain to use when several are installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnginePreference {
    #[default]
    Auto,
    Native,
    Docbuilder,
    Office,
}

impl EnginePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Native => "native",
            Self::Docbuilder => "docbuilder",
            Self::Office => "office",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.as_str() == value)
    }

    pub fn all() -> &'static [EnginePreference] {
        &[
            EnginePreference::Auto,
            EnginePreference::Native,
            EnginePreference::Docbuilder,
            EnginePreference::Office,
        ]
    }
}

impl std::fmt::Display for EnginePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of the probe, usually built from the user configuration.
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    pub prefer: EnginePreference,
    /// Folder holding one subfolder per bundled document-builder build.
    pub bundle_dir: Option<PathBuf>,
    pub office_path: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub dpi: u32,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            prefer: EnginePreference::Auto,
            bundle_dir: None,
            office_path: None,
            cache_dir: default_cache_root(),
            dpi: DEFAULT_DPI,
        }
    }
}

/// Operating system family and CPU architecture of the host, spelled the way
/// `std::env::consts` spells them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

/// Folder-name substrings per OS family. Families are tested in this order,
/// so `darwin` is claimed by macOS before `win` can match it.
const OS_TOKENS: &[(&str, &[&str])] = &[
    ("macos", &["macos", "darwin", "osx", "mac"]),
    ("windows", &["windows", "win"]),
    ("linux", &["linux"]),
];

/// Folder-name substrings per architecture, `x86_64` before `x86` so a
/// 64-bit build is never mistaken for a 32-bit one.
const ARCH_TOKENS: &[(&str, &[&str])] = &[
    ("x86_64", &["x86_64", "amd64", "x64"]),
    ("aarch64", &["aarch64", "arm64"]),
    ("x86", &["x86", "ia32", "i686"]),
];

fn declared(name: &str, families: &[(&'static str, &[&str])]) -> Option<&'static str> {
    families
        .iter()
        .find(|(_, tokens)| tokens.iter().any(|t| name.contains(t)))
        .map(|(family, _)| *family)
}

impl HostInfo {
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Rank of a bundle folder for this host, lower is better:
    ///
    /// 0. names this OS and this architecture (`linux-x64`, `win_arm64`)
    /// 1. names this OS and no architecture (`linux`, `mac-universal`)
    ///
    /// Folders for another OS or another architecture are rejected.
    pub fn bundle_rank(&self, folder: &str) -> Option<u8> {
        let name = folder.to_ascii_lowercase();
        if declared(&name, OS_TOKENS)? != self.os {
            return None;
        }
        match declared(&name, ARCH_TOKENS) {
            Some(arch) if arch == self.arch => Some(0),
            Some(_) => None,
            None => Some(1),
        }
    }

    /// Order `folders` best-first, dropping those unusable on this host.
    /// Ties keep name order so the choice is deterministic.
    pub fn rank_bundles<'a>(&self, folders: &'a [String]) -> Vec<&'a str> {
        let mut ranked: Vec<(u8, &str)> = folders
            .iter()
            .filter_map(|f| self.bundle_rank(f).map(|r| (r, f.as_str())))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, f)| f).collect()
    }

    fn docbuilder_binary(&self) -> &'static str {
        if self.os == "windows" {
            "docbuilder.exe"
        } else {
            "docbuilder"
        }
    }
}

/// `engines/` next to the running executable.
pub fn default_bundle_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("engines"))
}

/// Best bundled document builder for `host`: binary path and folder name.
pub fn locate_docbuilder(bundle_dir: &Path, host: &HostInfo) -> Option<(PathBuf, String)> {
    let folders: Vec<String> = std::fs::read_dir(bundle_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();

    let binary = host.docbuilder_binary();
    for folder in host.rank_bundles(&folders) {
        let root = bundle_dir.join(folder);
        for exe in [root.join(binary), root.join("bin").join(binary)] {
            if exe.is_file() {
                return Some((exe, folder.to_string()));
            }
        }
        debug!(folder, "bundle folder matches host but holds no builder binary");
    }
    None
}

/// What the probe found on this host.
pub struct Probe {
    pub native: Option<PowerPointExporter>,
    pub docbuilder: Option<(PathBuf, String)>,
    pub office: Option<PathBuf>,
}

impl Probe {
    pub fn run(options: &SelectorOptions, host: &HostInfo) -> Self {
        let bundle_dir = options.bundle_dir.clone().or_else(default_bundle_dir);
        Self {
            native: PowerPointExporter::detect(),
            docbuilder: bundle_dir.and_then(|dir| locate_docbuilder(&dir, host)),
            office: OfficeExporter::locate(options.office_path.as_deref()),
        }
    }

    /// Discovered toolchains in priority order, with a description each.
    pub fn available(&self) -> Vec<(EnginePreference, String)> {
        let mut found = Vec::new();
        if self.native.is_some() {
            found.push((EnginePreference::Native, "PowerPoint (COM automation)".to_string()));
        }
        if let Some((exe, folder)) = &self.docbuilder {
            found.push((
                EnginePreference::Docbuilder,
                format!("Document Builder [{folder}] {}", exe.display()),
            ));
        }
        if let Some(exe) = &self.office {
            found.push((EnginePreference::Office, format!("Office suite {}", exe.display())));
        }
        found
    }

    /// Pick the exporter: the preferred toolchain when it was found, the
    /// first available otherwise.
    pub fn into_exporter(self, prefer: EnginePreference) -> Box<dyn PdfExporter> {
        let Probe {
            native,
            docbuilder,
            office,
        } = self;

        let mut native = native.map(|e| Box::new(e) as Box<dyn PdfExporter>);
        let mut docbuilder = docbuilder
            .map(|(exe, folder)| Box::new(DocBuilderExporter::new(exe, &folder)) as Box<dyn PdfExporter>);
        let mut office = office.map(|exe| Box::new(OfficeExporter::new(exe)) as Box<dyn PdfExporter>);

        let preferred = match prefer {
            EnginePreference::Auto => None,
            EnginePreference::Native => native.take(),
            EnginePreference::Docbuilder => docbuilder.take(),
            EnginePreference::Office => office.take(),
        };
        if preferred.is_none() && prefer != EnginePreference::Auto {
            warn!(prefer = %prefer, "preferred toolchain not available, using default priority");
        }

        preferred
            .or(native)
            .or(docbuilder)
            .or(office)
            .unwrap_or_else(|| {
                warn!("no conversion toolchain found; slides will render as placeholders");
                Box::new(OfficeExporter::fallback())
            })
    }
}

fn default_rasterizer() -> Box<dyn Rasterizer> {
    match PdfToPpm::new() {
        Ok(raster) => Box::new(raster),
        Err(err) => {
            warn!("{err}");
            Box::new(PdfToPpm::with_exe("pdftoppm"))
        }
    }
}

/// Probe the host once and build the engine the application will use.
pub fn select_engine(options: &SelectorOptions) -> Arc<dyn ConverterEngine> {
    let host = HostInfo::current();
    let exporter = Probe::run(options, &host).into_exporter(options.prefer);
    info!(engine = exporter.name(), tag = exporter.tag(), os = %host.os, arch = %host.arch, "conversion engine selected");
    Arc::new(CachedEngine::new(
        exporter,
        default_rasterizer(),
        &options.cache_dir,
        options.dpi,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_arch_beats_os_only() {
        let host = HostInfo::new("linux", "x86_64");
        let folders = names(&["linux", "linux-arm64", "linux-x64", "win-x64"]);
        assert_eq!(host.rank_bundles(&folders), vec!["linux-x64", "linux"]);
    }

    #[test]
    fn test_os_only_fallback() {
        let host = HostInfo::new("macos", "aarch64");
        let folders = names(&["mac-universal", "darwin-x86_64"]);
        assert_eq!(host.rank_bundles(&folders), vec!["mac-universal"]);
    }

    #[test]
    fn test_darwin_is_not_windows() {
        let host = HostInfo::new("windows", "x86_64");
        assert_eq!(host.bundle_rank("darwin-x64"), None);
        assert_eq!(host.bundle_rank("Windows_AMD64"), Some(0));
        assert_eq!(host.bundle_rank("win"), Some(1));
    }

    #[test]
    fn test_64_bit_is_not_32_bit() {
        let host = HostInfo::new("linux", "x86");
        assert_eq!(host.bundle_rank("linux-x86_64"), None);
        assert_eq!(host.bundle_rank("linux-x86"), Some(0));
    }

    #[test]
    fn test_locate_docbuilder_skips_empty_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let host = HostInfo::new("linux", "x86_64");
        std::fs::create_dir_all(tmp.path().join("linux-x64")).unwrap();
        std::fs::create_dir_all(tmp.path().join("linux/bin")).unwrap();
        std::fs::write(tmp.path().join("linux/bin/docbuilder"), "").unwrap();

        let (exe, folder) = locate_docbuilder(tmp.path(), &host).unwrap();
        assert_eq!(folder, "linux");
        assert!(exe.ends_with("linux/bin/docbuilder"));
    }

    #[test]
    fn test_locate_docbuilder_missing_dir() {
        let host = HostInfo::new("linux", "x86_64");
        assert!(locate_docbuilder(Path::new("/definitely/not/here"), &host).is_none());
    }

    fn probe() -> Probe {
        Probe {
            native: None,
            docbuilder: Some((PathBuf::from("/engines/linux-x64/docbuilder"), "linux-x64".into())),
            office: Some(PathBuf::from("/usr/bin/soffice")),
        }
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(probe().into_exporter(EnginePreference::Auto).tag(), "docbuilder-linux-x64");
        let only_office = Probe {
            docbuilder: None,
            ..probe()
        };
        assert_eq!(only_office.into_exporter(EnginePreference::Auto).tag(), "office");
    }

    #[test]
    fn test_preference_overrides_priority() {
        assert_eq!(probe().into_exporter(EnginePreference::Office).tag(), "office");
        // Unavailable preference falls back to the normal order.
        assert_eq!(
            probe().into_exporter(EnginePreference::Native).tag(),
            "docbuilder-linux-x64"
        );
    }

    #[test]
    fn test_nothing_found_still_yields_exporter() {
        let empty = Probe {
            native: None,
            docbuilder: None,
            office: None,
        };
        assert!(empty.available().is_empty());
        assert_eq!(empty.into_exporter(EnginePreference::Auto).tag(), "office");
    }

    #[test]
    fn test_preference_names() {
        assert_eq!(EnginePreference::parse("docbuilder"), Some(EnginePreference::Docbuilder));
        assert_eq!(EnginePreference::parse("libreoffice"), None);
        assert_eq!(EnginePreference::Office.to_string(), "office");
    }
}
