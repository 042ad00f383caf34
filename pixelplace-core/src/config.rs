//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest accepted render scale.
pub const MAX_SCALE: u32 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main configuration struct matching the pixelplace.yml schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub commands: CommandConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// When accumulated deltas are flushed to rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchMode {
    /// Flush on the scheduled sweep only.
    Time,
    /// Flush when a scope reaches its batch size.
    Count,
    /// Whichever comes first.
    #[default]
    Hybrid,
}

impl BatchMode {
    pub fn flushes_on_count(self) -> bool {
        matches!(self, BatchMode::Count | BatchMode::Hybrid)
    }

    pub fn flushes_on_timer(self) -> bool {
        matches!(self, BatchMode::Time | BatchMode::Hybrid)
    }
}

/// Raster generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub mode: BatchMode,

    #[serde(default = "default_batch_interval_seconds")]
    pub batch_interval_seconds: u64,

    #[serde(default = "default_canvas_batch_size")]
    pub canvas_batch_size: usize,

    #[serde(default = "default_tile_batch_size")]
    pub tile_batch_size: usize,

    /// Edge length of a tile in canvas pixels. Changing it invalidates every
    /// persisted tile raster; see `pixelplace render --tiles`.
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    #[serde(default = "default_scale_versions")]
    pub scale_versions: Vec<u32>,

    #[serde(default = "default_tile_scale_versions")]
    pub tile_scale_versions: Vec<u32>,

    #[serde(default)]
    pub default_grid: bool,

    #[serde(default = "default_true")]
    pub tiles_enabled: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: BatchMode::default(),
            batch_interval_seconds: default_batch_interval_seconds(),
            canvas_batch_size: default_canvas_batch_size(),
            tile_batch_size: default_tile_batch_size(),
            tile_size: default_tile_size(),
            scale_versions: default_scale_versions(),
            tile_scale_versions: default_tile_scale_versions(),
            default_grid: false,
            tiles_enabled: true,
        }
    }
}

impl GenerationConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_batch_interval_seconds() -> u64 {
    5
}

fn default_canvas_batch_size() -> usize {
    10
}

fn default_tile_batch_size() -> usize {
    5
}

fn default_tile_size() -> u32 {
    100
}

fn default_scale_versions() -> Vec<u32> {
    vec![1]
}

fn default_tile_scale_versions() -> Vec<u32> {
    vec![10]
}

/// Placement rate limiting. Disabled unless explicitly enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_pixels_per_period")]
    pub max_pixels_per_period: usize,

    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,

    #[serde(default)]
    pub bypass_users: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_pixels_per_period: default_max_pixels_per_period(),
            cooldown_minutes: default_cooldown_minutes(),
            bypass_users: Vec::new(),
        }
    }
}

fn default_max_pixels_per_period() -> usize {
    3
}

fn default_cooldown_minutes() -> i64 {
    5
}

/// Placement history retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Most recent placements kept per coordinate; `null` keeps everything.
    #[serde(default = "default_retain_last")]
    pub retain_last: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retain_last: default_retain_last(),
        }
    }
}

fn default_retain_last() -> Option<usize> {
    Some(256)
}

/// Command dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_partitions")]
    pub partitions: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
        }
    }
}

fn default_partitions() -> usize {
    8
}

/// File-backed storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl StorageConfig {
    pub fn event_log_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    pub fn raster_dir(&self) -> PathBuf {
        self.data_dir.join("canvas-images")
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;

        if generation.tile_size == 0 {
            return Err(invalid("generation.tile_size", "must be at least 1"));
        }
        if generation.canvas_batch_size == 0 {
            return Err(invalid("generation.canvas_batch_size", "must be at least 1"));
        }
        if generation.tile_batch_size == 0 {
            return Err(invalid("generation.tile_batch_size", "must be at least 1"));
        }
        if generation.batch_interval_seconds == 0 {
            return Err(invalid(
                "generation.batch_interval_seconds",
                "must be at least 1",
            ));
        }
        check_scales("generation.scale_versions", &generation.scale_versions)?;
        check_scales(
            "generation.tile_scale_versions",
            &generation.tile_scale_versions,
        )?;

        if self.commands.partitions == 0 {
            return Err(invalid("commands.partitions", "must be at least 1"));
        }
        if self.history.retain_last == Some(0) {
            return Err(invalid("history.retain_last", "must keep at least 1 entry"));
        }
        if let Some(retain) = self.history.retain_last {
            if self.rate_limit.enabled && retain < self.rate_limit.max_pixels_per_period {
                return Err(ConfigError::Invalid {
                    field: "history.retain_last",
                    reason: format!(
                        "keeps {retain} entries, fewer than rate_limit.max_pixels_per_period ({})",
                        self.rate_limit.max_pixels_per_period
                    ),
                });
            }
        }

        Ok(())
    }
}

fn check_scales(field: &'static str, scales: &[u32]) -> Result<(), ConfigError> {
    if scales.is_empty() {
        return Err(invalid(field, "needs at least one scale"));
    }
    if let Some(bad) = scales.iter().find(|s| !(1..=MAX_SCALE).contains(*s)) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("scale {bad} is outside 1..={MAX_SCALE}"),
        });
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert!(config.generation.enabled);
        assert_eq!(config.generation.mode, BatchMode::Hybrid);
        assert_eq!(config.generation.batch_interval_seconds, 5);
        assert_eq!(config.generation.canvas_batch_size, 10);
        assert_eq!(config.generation.tile_batch_size, 5);
        assert_eq!(config.generation.tile_size, 100);
        assert_eq!(config.generation.scale_versions, vec![1]);
        assert_eq!(config.generation.tile_scale_versions, vec![10]);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.history.retain_last, Some(256));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
generation:
  mode: COUNT
  canvas_batch_size: 3
  scale_versions: [1, 5, 10]
history:
  retain_last: null
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.generation.mode, BatchMode::Count);
        assert_eq!(config.generation.canvas_batch_size, 3);
        assert_eq!(config.generation.scale_versions, vec![1, 5, 10]);
        assert_eq!(config.generation.tile_batch_size, 5);
        assert_eq!(config.history.retain_last, None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = Config::from_yaml("generation:\n  tile_size: 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "generation.tile_size",
                ..
            }
        ));

        let err = Config::from_yaml("generation:\n  tile_scale_versions: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = Config::from_yaml("generation:\n  mode: SOMETIMES\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_rejects_out_of_range_scales() {
        let err = Config::from_yaml("generation:\n  scale_versions: [5000000]\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "generation.scale_versions",
                ..
            }
        ));
        let err = Config::from_yaml("generation:\n  tile_scale_versions: [10, 101]\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "generation.tile_scale_versions",
                ..
            }
        ));
        assert!(Config::from_yaml("generation:\n  scale_versions: [1, 100]\n").is_ok());
    }

    #[test]
    fn test_retention_must_cover_rate_limit() {
        let yaml = "rate_limit:\n  enabled: true\n  max_pixels_per_period: 5\nhistory:\n  retain_last: 4\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "history.retain_last",
                ..
            }
        ));

        // Unlimited history, or rate limiting off, is fine.
        let yaml = "rate_limit:\n  enabled: true\n  max_pixels_per_period: 5\nhistory:\n  retain_last: null\n";
        assert!(Config::from_yaml(yaml).is_ok());
        let yaml = "rate_limit:\n  max_pixels_per_period: 5\nhistory:\n  retain_last: 4\n";
        assert!(Config::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_mode_flags() {
        assert!(BatchMode::Count.flushes_on_count());
        assert!(!BatchMode::Count.flushes_on_timer());
        assert!(BatchMode::Time.flushes_on_timer());
        assert!(!BatchMode::Time.flushes_on_count());
        assert!(BatchMode::Hybrid.flushes_on_count() && BatchMode::Hybrid.flushes_on_timer());
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/tmp/pp"),
        };
        assert_eq!(storage.event_log_path(), PathBuf::from("/tmp/pp/events.jsonl"));
        assert_eq!(storage.raster_dir(), PathBuf::from("/tmp/pp/canvas-images"));
    }
}
