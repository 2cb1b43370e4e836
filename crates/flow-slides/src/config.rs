use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::convert::DEFAULT_DPI;
use crate::convert::cache::default_cache_root;
use crate::convert::select::{EnginePreference, SelectorOptions};

const FILENAME: &str = "config.yaml";
const APP_DIR: &str = "flow-slides";

/// How many recent projects are remembered.
pub const MAX_RECENT_PROJECTS: usize = 10;

const MIN_DPI: u32 = 36;
const MAX_DPI: u32 = 600;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_projects: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub prefer: EnginePreference,

    /// Folder holding the bundled document-builder builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
}

/// Case-insensitive key for comparing project paths.
fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(FILENAME))
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("No config found at {}.", path.display())
            } else {
                anyhow::anyhow!("Failed to read config: {e}")
            }
        })?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        let contents = format!("# flow-slides configuration\n{yaml}");
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "engine.prefer" => {
                let prefer = EnginePreference::parse(value).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Invalid engine: {value}. Must be 'auto', 'native', 'docbuilder', or 'office'."
                    )
                })?;
                self.engine.get_or_insert_with(EngineConfig::default).prefer = prefer;
            }
            "engine.bundle_dir" => {
                let dir = PathBuf::from(value);
                if !dir.is_dir() {
                    anyhow::bail!("Invalid bundle_dir: {value} is not a directory.");
                }
                self.engine.get_or_insert_with(EngineConfig::default).bundle_dir = Some(dir);
            }
            "engine.office_path" => {
                let exe = PathBuf::from(value);
                if !exe.is_file() {
                    anyhow::bail!("Invalid office_path: {value} does not exist.");
                }
                self.engine.get_or_insert_with(EngineConfig::default).office_path = Some(exe);
            }
            "cache.dir" => {
                if value.trim().is_empty() {
                    anyhow::bail!("Invalid cache dir: must not be empty.");
                }
                self.cache.get_or_insert_with(CacheConfig::default).dir = Some(PathBuf::from(value));
            }
            "cache.dpi" => {
                let dpi = value
                    .parse::<u32>()
                    .ok()
                    .filter(|d| (MIN_DPI..=MAX_DPI).contains(d))
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "Invalid dpi: {value}. Must be a number between {MIN_DPI} and {MAX_DPI}."
                        )
                    })?;
                self.cache.get_or_insert_with(CacheConfig::default).dpi = Some(dpi);
            }
            _ => anyhow::bail!(
                "Unknown config key: {key}. Valid keys: engine.prefer, engine.bundle_dir, engine.office_path, cache.dir, cache.dpi"
            ),
        }
        Ok(())
    }

    /// Probe inputs for the engine selector.
    pub fn selector_options(&self) -> SelectorOptions {
        let engine = self.engine.clone().unwrap_or_default();
        let cache = self.cache.clone().unwrap_or_default();
        SelectorOptions {
            prefer: engine.prefer,
            bundle_dir: engine.bundle_dir,
            office_path: engine.office_path,
            cache_dir: cache.dir.unwrap_or_else(default_cache_root),
            dpi: cache.dpi.unwrap_or(DEFAULT_DPI),
        }
    }

    /// Put `project` at the front of the recent list. The path must exist;
    /// an entry differing only in case is replaced.
    pub fn add_recent_project(&mut self, project: &Path) -> Result<()> {
        let project = project
            .canonicalize()
            .with_context(|| format!("Project not found: {}", project.display()))?;
        let key = path_key(&project);
        self.recent_projects.retain(|p| path_key(p) != key);
        self.recent_projects.insert(0, project);
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
        Ok(())
    }

    /// Recent projects that still exist. Missing ones are skipped but kept.
    pub fn recent_projects(&self) -> Vec<&Path> {
        self.recent_projects
            .iter()
            .filter(|p| p.exists())
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn remove_recent_project(&mut self, project: &Path) -> bool {
        let key = path_key(project);
        let before = self.recent_projects.len();
        self.recent_projects.retain(|p| path_key(p) != key);
        self.recent_projects.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Config::default().selector_options();
        assert_eq!(options.prefer, EnginePreference::Auto);
        assert_eq!(options.dpi, DEFAULT_DPI);
        assert_eq!(options.cache_dir, default_cache_root());
    }

    #[test]
    fn test_set_validates() {
        let mut config = Config::default();
        config.set("engine.prefer", "office").unwrap();
        config.set("cache.dpi", "200").unwrap();
        assert_eq!(config.selector_options().prefer, EnginePreference::Office);
        assert_eq!(config.selector_options().dpi, 200);

        assert!(config.set("engine.prefer", "keynote").is_err());
        assert!(config.set("cache.dpi", "9000").is_err());
        assert!(config.set("cache.dpi", "many").is_err());
        assert!(config.set("engine.office_path", "/no/such/soffice").is_err());
        let err = config.set("theme", "dark").unwrap_err();
        assert!(err.to_string().contains("Unknown config key"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flow-slides/config.yaml");
        let mut config = Config::default();
        config.set("engine.prefer", "docbuilder").unwrap();
        config.set("cache.dir", "/var/cache/flow").unwrap();
        config.save_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# flow-slides configuration"));
        assert!(text.contains("prefer: docbuilder"));
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_error_for_load_from() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&tmp.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("engine:\n  office_path: /opt/soffice\n").unwrap();
        let options = config.selector_options();
        assert_eq!(options.prefer, EnginePreference::Auto);
        assert_eq!(options.office_path, Some(PathBuf::from("/opt/soffice")));
    }

    #[test]
    fn test_recent_projects_front_and_dedup() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.flow");
        let b = tmp.path().join("b.flow");
        std::fs::write(&a, "{}").unwrap();
        std::fs::write(&b, "{}").unwrap();

        let mut config = Config::default();
        config.add_recent_project(&a).unwrap();
        config.add_recent_project(&b).unwrap();
        config.add_recent_project(&a).unwrap();
        let recent = config.recent_projects();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].ends_with("a.flow"));

        assert!(config.add_recent_project(&tmp.path().join("missing.flow")).is_err());
    }

    #[test]
    fn test_recent_projects_capped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        for i in 0..12 {
            let p = tmp.path().join(format!("p{i}.flow"));
            std::fs::write(&p, "{}").unwrap();
            config.add_recent_project(&p).unwrap();
        }
        assert_eq!(config.recent_projects.len(), MAX_RECENT_PROJECTS);
        assert!(config.recent_projects[0].ends_with("p11.flow"));
    }

    #[test]
    fn test_missing_recent_projects_hidden_not_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.flow");
        std::fs::write(&a, "{}").unwrap();
        let mut config = Config::default();
        config.add_recent_project(&a).unwrap();
        std::fs::remove_file(&a).unwrap();

        assert!(config.recent_projects().is_empty());
        assert_eq!(config.recent_projects.len(), 1);
    }

    #[test]
    fn test_remove_recent_project_ignores_case() {
        let mut config = Config {
            recent_projects: vec![PathBuf::from("/Songs/Sunday.flow")],
            ..Config::default()
        };
        assert!(config.remove_recent_project(Path::new("/songs/sunday.FLOW")));
        assert!(config.recent_projects.is_empty());
        assert!(!config.remove_recent_project(Path::new("/songs/sunday.flow")));
    }
}
