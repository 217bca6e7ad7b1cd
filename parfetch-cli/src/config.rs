use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "parfetch.toml";

/// Persisted defaults for `parfetch-cli`. Every key is optional; a missing
/// key falls back to the engine's built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    pub buffer_size: Option<u64>,
    pub max_threads: Option<usize>,
    pub max_bytes_per_thread: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    #[serde(default, alias = "max_retries")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub source: Option<PathBuf>,
    pub existed: bool,
    pub data: AppConfig,
}

pub fn load_config(path_override: Option<&Path>) -> Result<LoadedConfig> {
    let source = match path_override {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };

    match source {
        Some(path) => {
            let (data, existed) = load_config_from_path(&path)?;
            Ok(LoadedConfig {
                source: Some(path),
                existed,
                data,
            })
        }
        None => Ok(LoadedConfig {
            source: None,
            existed: false,
            data: AppConfig::default(),
        }),
    }
}

pub fn config_path_for_write(path_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = path_override {
        Ok(path.to_path_buf())
    } else if let Some(path) = default_config_path() {
        Ok(path)
    } else {
        anyhow::bail!("unable to determine configuration directory");
    }
}

pub fn save_config(path_override: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    let path = config_path_for_write(path_override)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create configuration directory {}",
                parent.display()
            )
        })?;
    }
    let content = toml::to_string_pretty(config).context("failed to serialize configuration")?;
    fs::write(&path, content)
        .with_context(|| format!("failed to write configuration to {}", path.display()))?;
    Ok(path)
}

fn load_config_from_path(path: &Path) -> Result<(AppConfig, bool)> {
    if !path.exists() {
        return Ok((AppConfig::default(), false));
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok((config, true))
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "parfetch").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded = load_config(Some(&path)).unwrap();

        assert!(!loaded.existed);
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.data, AppConfig::default());
    }

    #[test]
    fn saved_config_is_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig {
            max_threads: Some(8),
            timeout_secs: Some(30),
            user_agent: Some("fetcher/1.0".to_string()),
            ..AppConfig::default()
        };
        config
            .headers
            .insert("Authorization".to_string(), "Bearer abc".to_string());

        let saved = save_config(Some(&path), &config).unwrap();
        let loaded = load_config(Some(&saved)).unwrap();

        assert!(loaded.existed);
        assert_eq!(loaded.data, config);
    }

    #[test]
    fn legacy_retry_key_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_retries = 4\nbuffer_size = 65536\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();

        assert_eq!(loaded.data.max_attempts, Some(4));
        assert_eq!(loaded.data.buffer_size, Some(65536));
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_threads = \"many\"").unwrap();

        let err = load_config(Some(&path)).unwrap_err();

        assert!(err.to_string().contains("failed to parse config file"));
    }
}
