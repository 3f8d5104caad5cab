//! Configuration loading for page rendering.

use crate::memory::{MemoryThresholds, DEFAULT_HANDLE_THRESHOLD};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RenderConfig {
    pub memory: Option<MemoryConfig>,
    pub temp_files: Option<TempFileConfig>,
    pub binding: Option<BindingConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MemoryConfig {
    pub working_set_threshold_mb: Option<u64>,
    pub handle_threshold: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TempFileConfig {
    pub directory: Option<PathBuf>,
    pub sweep_threshold: Option<usize>,
    pub max_age_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BindingConfig {
    pub poll_interval_ms: Option<u64>,
}

/// Default working-set growth flagged abnormal, in MB
pub const DEFAULT_WORKING_SET_THRESHOLD_MB: u64 = 100;

/// Tracked temp files beyond which a sweep is scheduled
pub const DEFAULT_SWEEP_THRESHOLD: usize = 100;

/// Temp files older than this are swept (1 hour)
pub const DEFAULT_MAX_AGE_SECS: u64 = 60 * 60;

/// UI state poll period
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Directory name used under the system temp dir and for project dirs
pub const APP_DIR_NAME: &str = "page-render";

impl RenderConfig {
    /// Effective memory thresholds.
    /// Returns configured values or defaults (100 MB, 1000 handles).
    pub fn memory_thresholds(&self) -> MemoryThresholds {
        let memory = self.memory.as_ref();
        MemoryThresholds {
            working_set_bytes: memory
                .and_then(|m| m.working_set_threshold_mb)
                .unwrap_or(DEFAULT_WORKING_SET_THRESHOLD_MB)
                .saturating_mul(1024 * 1024),
            handle_count: memory
                .and_then(|m| m.handle_threshold)
                .unwrap_or(DEFAULT_HANDLE_THRESHOLD),
        }
    }

    /// Directory for round-trip temp files, `<system temp>/page-render` by default
    pub fn temp_directory(&self) -> PathBuf {
        self.temp_files
            .as_ref()
            .and_then(|t| t.directory.clone())
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME))
    }

    pub fn sweep_threshold(&self) -> usize {
        self.temp_files
            .as_ref()
            .and_then(|t| t.sweep_threshold)
            .unwrap_or(DEFAULT_SWEEP_THRESHOLD)
    }

    pub fn max_temp_file_age(&self) -> Duration {
        Duration::from_secs(
            self.temp_files
                .as_ref()
                .and_then(|t| t.max_age_secs)
                .unwrap_or(DEFAULT_MAX_AGE_SECS),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.binding
                .as_ref()
                .and_then(|b| b.poll_interval_ms)
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .max(1),
        )
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", APP_DIR_NAME)
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<RenderConfig> {
    if !path.exists() {
        return Ok(RenderConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: RenderConfig =
        toml::from_str(&contents).context("Failed to parse config file as TOML")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.memory_thresholds(), MemoryThresholds::default());
        assert_eq!(config.sweep_threshold(), 100);
        assert_eq!(config.max_temp_file_age(), Duration::from_secs(3600));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(config.temp_directory().ends_with(APP_DIR_NAME));
    }

    #[test]
    fn test_memory_thresholds_configured() {
        let config = RenderConfig {
            memory: Some(MemoryConfig {
                working_set_threshold_mb: Some(250),
                handle_threshold: None,
            }),
            ..Default::default()
        };
        let thresholds = config.memory_thresholds();
        assert_eq!(thresholds.working_set_bytes, 250 * 1024 * 1024);
        assert_eq!(thresholds.handle_count, 1000);
    }

    #[test]
    fn test_zero_poll_interval_clamped() {
        let config = RenderConfig {
            binding: Some(BindingConfig {
                poll_interval_ms: Some(0),
            }),
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.memory.is_none());
        assert!(config.temp_files.is_none());
    }

    #[test]
    fn test_load_config_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[temp_files]\ndirectory = \"/var/tmp/render\"\nsweep_threshold = 5\n\n[binding]\npoll_interval_ms = 25"
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.temp_directory(), PathBuf::from("/var/tmp/render"));
        assert_eq!(config.sweep_threshold(), 5);
        assert_eq!(config.max_temp_file_age(), Duration::from_secs(3600));
        assert_eq!(config.poll_interval(), Duration::from_millis(25));
    }

    #[test]
    fn test_load_malformed_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[memory\nhandle_threshold = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }
}
