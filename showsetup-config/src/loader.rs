// Standard library imports
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use anyhow::{bail, Context, Result};
use tracing::debug;

// Internal imports
use crate::config::DivisionConfigs;

/// Base name of the provisioning configuration file.
pub const CONFIG_FILE_STEM: &str = "show_setup_configs";

const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// A loader responsible for finding and loading the division configuration.
///
/// Priority chain:
/// 1. **Explicit path:** the `--config` argument, with `~` and environment
///    variables expanded. It must exist.
/// 2. **Current directory:** `show_setup_configs.{json,yaml,yml}`.
/// 3. **`config/` subdirectory** of the current directory.
/// 4. **User config directory:** `<config dir>/p4-showsetup/`.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader using the default search locations.
    pub fn new() -> Self {
        let mut search_dirs = vec![PathBuf::from("."), PathBuf::from("config")];
        if let Some(config_dir) = dirs::config_dir() {
            search_dirs.push(config_dir.join("p4-showsetup"));
        }
        Self {
            explicit: None,
            search_dirs,
        }
    }

    /// Creates a loader searching only `dirs`.
    pub fn with_search_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            explicit: None,
            search_dirs: dirs,
        }
    }

    /// Use `path` instead of searching.
    pub fn with_path(mut self, path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            let expanded = shellexpand::full(path)
                .with_context(|| format!("Failed to expand config path {path}"))?;
            self.explicit = Some(PathBuf::from(expanded.as_ref()));
        }
        Ok(self)
    }

    /// Locates the configuration file without reading it.
    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit {
            if !path.is_file() {
                bail!("Config file {} does not exist", path.display());
            }
            return Ok(path.clone());
        }

        for dir in &self.search_dirs {
            for ext in EXTENSIONS {
                let candidate = dir.join(format!("{CONFIG_FILE_STEM}.{ext}"));
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        let searched: Vec<String> = self
            .search_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        bail!(
            "No {CONFIG_FILE_STEM}.json found (searched: {}). Pass --config to point at one.",
            searched.join(", ")
        );
    }

    /// Locates and loads the configuration, returning where it came from.
    pub fn load(&self) -> Result<(PathBuf, DivisionConfigs)> {
        let path = self.locate()?;
        debug!("Loading config from: {}", path.display());
        let configs = load_file(&path)?;
        Ok((path, configs))
    }
}

/// Loads and deserializes division configs from `path`, picking the format
/// by extension.
pub fn load_file(path: &Path) -> Result<DivisionConfigs> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file at {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let configs: DivisionConfigs = match ext.as_str() {
        "yaml" | "yml" => serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        other => bail!(
            "Unsupported config format '{other}' for {}, expected one of: {}",
            path.display(),
            EXTENSIONS.join(", ")
        ),
    };

    Ok(configs)
}
