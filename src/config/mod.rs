//! Configuration module for product-search
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::info;

/// Global settings instance
static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Environment variable naming an explicit settings file
pub const SETTINGS_PATH_VAR: &str = "PRODUCT_SEARCH_SETTINGS_PATH";

/// Initialize global settings
pub fn init(settings: Settings) -> Result<&'static Settings> {
    SETTINGS
        .set(settings)
        .map_err(|_| anyhow::anyhow!("Settings already initialized"))?;
    Ok(get())
}

/// Get a reference to the global settings, defaults if never initialized
pub fn get() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}

/// Candidate settings files, most specific first
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(path) = std::env::var(SETTINGS_PATH_VAR) {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("settings.yml"));
    paths.push(PathBuf::from("config/settings.yml"));
    paths.push(PathBuf::from("/etc/product-search/settings.yml"));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("product-search/settings.yml"));
    }
    paths
}

/// Load settings from the first existing file, or defaults, then apply environment overrides
pub fn load() -> Result<Settings> {
    load_from(&search_paths())
}

fn load_from(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = match paths.iter().find(|path| path.exists()) {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };
    settings.merge_env();
    Ok(settings)
}

/// Load settings from an explicit file, then apply environment overrides
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    info!("Loading settings from: {}", path.display());
    let mut settings = Settings::from_file(path)?;
    settings.merge_env();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_files_uses_defaults() {
        let settings = load_from(&[PathBuf::from("/nonexistent/product-search.yml")]).unwrap();
        assert_eq!(settings.engine.index, "products");
    }

    #[test]
    fn test_load_reads_first_existing_file() {
        let path = std::env::temp_dir().join(format!("product-search-{}.yml", std::process::id()));
        std::fs::write(&path, "engine:\n  index: seeded\n").unwrap();

        let settings = load_from(&[PathBuf::from("/nonexistent/a.yml"), path.clone()]).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.engine.index, "seeded");
    }

    #[test]
    fn test_search_paths_include_defaults() {
        let paths = search_paths();
        assert!(paths.contains(&PathBuf::from("settings.yml")));
        assert!(paths.contains(&PathBuf::from("/etc/product-search/settings.yml")));
    }
}
