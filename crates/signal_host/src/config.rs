//! Configuration management for the signal host.
//!
//! This module handles loading, validation, and conversion of host configuration
//! from TOML files and command-line arguments.

use serde::{Deserialize, Serialize};
use signal_proxy::SchedulerConfig;
use std::path::PathBuf;
use tracing::info;

/// Default frame interval for serde deserialization
fn default_frame_interval() -> u64 {
    16 // ~60 frames per second
}

fn default_max_frames() -> u64 {
    600
}

fn default_stats_interval_frames() -> u64 {
    300
}

fn default_timer_period_frames() -> u64 {
    30
}

fn default_button_period_frames() -> u64 {
    90
}

fn default_damage_per_hit() -> i64 {
    25
}

fn default_max_health() -> i64 {
    100
}

/// Host configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Frame loop settings
    #[serde(default)]
    pub host: HostSettings,
    /// Deferred-delivery queue settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Demo scene tuning
    #[serde(default)]
    pub scene: SceneSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Frame loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Milliseconds between frames
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    /// Frames to run before exiting (0 runs until a shutdown signal)
    #[serde(default = "default_max_frames")]
    pub max_frames: u64,
    /// Frames between periodic statistics reports (0 disables them)
    #[serde(default = "default_stats_interval_frames")]
    pub stats_interval_frames: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
            max_frames: default_max_frames(),
            stats_interval_frames: default_stats_interval_frames(),
        }
    }
}

/// Deferred queue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Deferred callbacks run per frame (0 = all queued)
    #[serde(default)]
    pub max_tasks_per_frame: usize,
}

/// Demo scene configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    /// Frames between timer timeouts
    #[serde(default = "default_timer_period_frames")]
    pub timer_period_frames: u64,
    /// Frames between simulated button presses
    #[serde(default = "default_button_period_frames")]
    pub button_period_frames: u64,
    /// Health removed per timeout
    #[serde(default = "default_damage_per_hit")]
    pub damage_per_hit: i64,
    /// Health restored on respawn
    #[serde(default = "default_max_health")]
    pub max_health: i64,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            timer_period_frames: default_timer_period_frames(),
            button_period_frames: default_button_period_frames(),
            damage_per_hit: default_damage_per_hit(),
            max_health: default_max_health(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, or creates a default one.
    ///
    /// If the file exists, it's parsed; missing sections fall back to
    /// defaults. If not, a default configuration file is written.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Scheduler configuration for the frame scheduler.
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_tasks_per_frame: self.scheduler.max_tasks_per_frame,
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.frame_interval_ms == 0 || self.host.frame_interval_ms > 1000 {
            return Err(format!(
                "Frame interval must be between 1 and 1000 ms, got {}",
                self.host.frame_interval_ms
            ));
        }

        if self.scene.timer_period_frames == 0 {
            return Err("Timer period must be at least one frame".to_string());
        }
        if self.scene.button_period_frames == 0 {
            return Err("Button period must be at least one frame".to_string());
        }
        if self.scene.max_health <= 0 {
            return Err("Max health must be positive".to_string());
        }
        if self.scene.damage_per_hit <= 0 {
            return Err("Damage per hit must be positive".to_string());
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(format!("Invalid log level: {}", self.logging.level)),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.host.frame_interval_ms, 16);
        assert_eq!(config.host.max_frames, 600);
        assert_eq!(config.host.stats_interval_frames, 300);
        assert_eq!(config.scheduler.max_tasks_per_frame, 0);
        assert_eq!(config.scene.timer_period_frames, 30);
        assert_eq!(config.scene.button_period_frames, 90);
        assert_eq!(config.scene.damage_per_hit, 25);
        assert_eq!(config.scene.max_health, 100);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal_host.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.host.frame_interval_ms, 16);

        // The default file is written for next time
        assert!(path.exists());
        let written = fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("frame_interval_ms"));
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[host]
frame_interval_ms = 33
max_frames = 0

[scheduler]
max_tasks_per_frame = 8

[scene]
timer_period_frames = 10
damage_per_hit = 50

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(config.host.frame_interval_ms, 33);
        assert_eq!(config.host.max_frames, 0);
        assert_eq!(config.host.stats_interval_frames, 300);
        assert_eq!(config.scheduler.max_tasks_per_frame, 8);
        assert_eq!(config.scene.timer_period_frames, 10);
        assert_eq!(config.scene.button_period_frames, 90);
        assert_eq!(config.scene.damage_per_hit, 50);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.to_scheduler_config().max_tasks_per_frame, 8);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[host\nframe_interval_ms = ").await.unwrap();

        assert!(AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .is_err());
    }

    #[test]
    fn test_validation_invalid_frame_interval() {
        let mut config = AppConfig::default();
        config.host.frame_interval_ms = 0;
        assert!(config.validate().is_err());

        config.host.frame_interval_ms = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_scene() {
        let mut config = AppConfig::default();
        config.scene.timer_period_frames = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scene.max_health = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scene.damage_per_hit = -5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_levels() {
        let mut config = AppConfig::default();
        for level in ["trace", "debug", "info", "warn", "error"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "level {level} should be valid");
        }

        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
